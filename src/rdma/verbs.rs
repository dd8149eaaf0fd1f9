//! Hardware verbs primitives.
//!
//! This crate drives a verbs provider; it does not implement one. A provider
//! wraps `libibverbs` (or a vendor direct-verbs library) and exposes the
//! handful of primitives the queue pair manager needs through [`Verbs`].

use std::{fmt, io};

use thiserror::Error;

use super::flow::FlowAttr;
use super::qp::{QpCaps, QpInitAttr, QpState, QpTransition};
use super::ratelimit::{RateLimit, RateLimitChanges};
use super::type_alias::*;
use super::wr::{RecvWr, SendWr};

/// Opaque handle of a hardware queue pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QpHandle {
    /// Provider-specific handle value.
    pub raw: u64,

    /// Queue pair number assigned by the device.
    pub qpn: Qpn,
}

impl fmt::Display for QpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qp<{:#x}, num={}>", self.raw, self.qpn)
    }
}

/// Opaque handle of a hardware completion queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CqHandle(pub u64);

/// Opaque handle of a hardware flow steering rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FlowHandle(pub u64);

/// Error of a rejected receive post.
#[derive(Debug, Error)]
#[error("post_recv rejected at chain index {bad_index}: {source}")]
pub struct PostRecvError {
    /// Index (in the posted slice) of the first work request that was not
    /// posted. Every request before it in the chain was accepted.
    pub bad_index: usize,

    /// The error reported by the provider.
    #[source]
    pub source: io::Error,
}

/// Hardware verbs primitives.
///
/// All methods map one-to-one onto provider calls and report failures as
/// [`io::Error`]s carrying the provider's errno where one exists.
pub trait Verbs: Send + Sync {
    /// Create a queue pair.
    fn create_qp(&self, init_attr: &QpInitAttr) -> io::Result<QpHandle>;

    /// Destroy a queue pair.
    fn destroy_qp(&self, qp: QpHandle) -> io::Result<()>;

    /// Query the current state of a queue pair.
    fn query_qp_state(&self, qp: QpHandle) -> io::Result<QpState>;

    /// Query the capabilities the device actually granted to a queue pair.
    fn query_qp_caps(&self, qp: QpHandle) -> io::Result<QpCaps>;

    /// Apply a state transition.
    fn modify_qp(&self, qp: QpHandle, transition: QpTransition) -> io::Result<()>;

    /// Post the chain of receive work requests that starts at `wrs[0]` and
    /// follows each request's `next` index.
    ///
    /// On failure, the provider may have cut the chain at the failing
    /// position; the caller repairs it.
    fn post_recv(&self, qp: QpHandle, wrs: &mut [RecvWr]) -> Result<(), PostRecvError>;

    /// Post one send work request.
    fn post_send(&self, qp: QpHandle, wr: &SendWr) -> io::Result<()>;

    /// Apply a packet pacing configuration to a queue pair.
    fn modify_rate_limit(
        &self,
        qp: QpHandle,
        rate_limit: &RateLimit,
        changes: RateLimitChanges,
    ) -> io::Result<()>;

    /// Pin a queue pair's transmit traffic to one port of a link
    /// aggregation group.
    fn modify_qp_lag_port(&self, qp: QpHandle, port: PortNum) -> io::Result<()>;

    /// Query a queue pair's configured and active link aggregation ports.
    fn query_qp_lag_port(&self, qp: QpHandle) -> io::Result<(PortNum, PortNum)>;

    /// Create a flow steering rule that directs matching packets to `qp`.
    fn create_flow(&self, qp: QpHandle, attr: &FlowAttr) -> io::Result<FlowHandle>;

    /// Destroy a flow steering rule.
    fn destroy_flow(&self, flow: FlowHandle) -> io::Result<()>;

    /// Determine whether the receive queue holds no outstanding work
    /// requests. Providers that cannot tell report `false`.
    fn rq_is_empty(&self, _qp: QpHandle) -> bool {
        false
    }
}

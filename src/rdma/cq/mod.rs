//! Completion queue managers.
//!
//! Completion processing is owned by the completion queue collaborator: it
//! polls hardware completions, maps their work request identifiers back to
//! buffer descriptors, and hands the buffers to their consumers. The queue
//! pair manager only registers itself and triggers polling passes.

use std::fmt;
use std::io;
use std::os::fd::RawFd;

use thiserror::Error;

use super::type_alias::*;
use super::verbs::CqHandle;

/// Which side of a queue pair a completion queue serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqDirection {
    /// Send completions.
    Tx,

    /// Receive completions.
    Rx,
}

impl fmt::Display for CqDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx => f.write_str("tx"),
            Self::Rx => f.write_str("rx"),
        }
    }
}

/// CQ creation error type.
#[derive(Debug, Error)]
pub enum CqCreationError {
    /// The verbs provider returned an error.
    #[error("I/O error from ibverbs")]
    Io(#[from] io::Error),

    /// The capacity of the CQ is larger than the device's maximum allowed
    /// capacity, which is contained in the error.
    #[error("CQ capacity too large (maximum: {0})")]
    TooManyCqes(u32),
}

/// A completion queue manager serving one direction of one or more queue
/// pairs.
pub trait CompletionQueue: Send {
    /// Get the hardware completion queue handle.
    fn handle(&self) -> CqHandle;

    /// Get the completion notification channel descriptor, if any.
    fn channel_fd(&self) -> Option<RawFd>;

    /// Register a queue pair whose send completions arrive here.
    fn add_qp_tx(&mut self, qpn: Qpn);

    /// Deregister a queue pair registered with [`Self::add_qp_tx`].
    fn del_qp_tx(&mut self, qpn: Qpn);

    /// Register a queue pair whose receive completions arrive here.
    fn add_qp_rx(&mut self, qpn: Qpn);

    /// Deregister a queue pair registered with [`Self::add_qp_rx`].
    fn del_qp_rx(&mut self, qpn: Qpn);

    /// Poll send completions once and release their buffers. Return the
    /// number of completions processed.
    fn poll_and_process_tx(&mut self, poll_sn: &mut u64) -> io::Result<usize>;

    /// Drain receive completions once, flushed ones included, and hand their
    /// buffers on. `last_polled` is updated to the work request identifier of
    /// the last completion seen. Return the number of completions processed.
    fn drain_and_process_rx(&mut self, last_polled: &mut Option<WrId>) -> io::Result<usize>;
}

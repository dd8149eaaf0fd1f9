//! The `qpmgr` prelude.
//!
//! The purpose of this module is to alleviate imports of the types needed to
//! build and drive a queue pair manager.

pub use crate::config::{ConfigError, Hypervisor, QpConfig};
pub use crate::ctrl::{EventHandler, ShutdownSignal};
pub use crate::rdma::buf::{BufferDesc, BufferPool, DescQueue};
pub use crate::rdma::context::DeviceContext;
pub use crate::rdma::cq::{CompletionQueue, CqDirection};
pub use crate::rdma::flow::{FlowAttr, FlowRule, FlowSpec, OffloadContext};
pub use crate::rdma::qp::{EthQpMgr, QpCaps, QpError, QpMgr, QpMgrDesc, QpState};
pub use crate::rdma::ratelimit::{RateLimit, RateLimitChanges};
pub use crate::rdma::ring::Ring;
pub use crate::rdma::verbs::Verbs;
pub use crate::rdma::wr::{SendWr, Sge, TxPacketAttr};

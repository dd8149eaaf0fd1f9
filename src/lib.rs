//! Queue pair lifecycle and dataplane control for kernel-bypass Ethernet
//! stacks.
//!
//! `qpmgr` drives one hardware queue pair per [`QpMgr`] through its whole
//! life: capability negotiation against device limits, creation of the
//! companion completion queues, state transitions, batched receive posting,
//! selective send signaling, and a teardown drain that survives device
//! hot-unplug. It also applies packet pacing updates and creates flow
//! steering rules.
//!
//! The crate does not talk to hardware by itself. The verbs provider, the
//! completion queues, the ring that owns the buffers, the global buffer pool
//! and the asynchronous event poller are all supplied by the caller through
//! the traits in this crate ([`DeviceContext`], [`CompletionQueue`],
//! [`Ring`], [`BufferPool`], [`ctrl::EventHandler`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use qpmgr::prelude::*;
//!
//! fn bring_up(desc: QpMgrDesc) -> Result<EthQpMgr, QpError> {
//!     let config = QpConfig::load_toml("qpmgr.toml").unwrap_or_default();
//!     let shutdown = ShutdownSignal::new();
//!
//!     let mut mgr = EthQpMgr::new(desc, 4096, config);
//!     mgr.configure()?;
//!     mgr.up(&shutdown)?;
//!     Ok(mgr)
//! }
//! ```
//!
//! ## Warning
//!
//! **The interfaces are unstable and up to change!**

mod rdma;
pub use rdma::{
    buf::*, context::*, cq::*, flow::*, qp::*, ratelimit::*, ring::Ring, type_alias::*,
    verbs::*, wr::*,
};

/// Configuration.
pub mod config;

/// Control-plane utilities.
pub mod ctrl;

pub mod prelude;

mod utils;

#[cfg(test)]
mod test_utils;

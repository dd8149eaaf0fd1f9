//! Queue pair and related types.

use std::sync::Arc;
use std::{fmt, io};

use thiserror::Error;

use crate::rdma::{
    context::DeviceContext,
    cq::{CqCreationError, CqDirection},
    type_alias::*,
    verbs::QpHandle,
};
use crate::utils::interop::*;

pub use self::attr::*;
pub use self::eth::*;
pub use self::mgr::*;
pub use self::signal::*;
pub use self::state::*;
pub use self::ty::*;

mod attr;
mod eth;
mod mgr;
mod signal;
mod state;
mod ty;

/// Queue pair manager error type.
#[derive(Debug, Error)]
pub enum QpError {
    /// A companion completion queue could not be created.
    #[error("failed allocating {dir} CQ")]
    CqCreation {
        /// Which completion queue failed.
        dir: CqDirection,
        /// The underlying error.
        #[source]
        source: CqCreationError,
    },

    /// The queue pair could not be created.
    #[error("failed to create QP")]
    QpCreation(#[source] io::Error),

    /// The capabilities granted to the queue pair could not be queried.
    #[error("failed to query QP capabilities")]
    QueryCaps(#[source] io::Error),

    /// A state transition was rejected.
    #[error("failed to modify QP from {from} to {to}")]
    Transition {
        /// State before the attempt.
        from: QpState,
        /// Target state.
        to: QpState,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A batched receive post was rejected. The receive chain has been
    /// repaired, but the queue pair should not be used further.
    #[error("failed posting receive list at index {bad_index}")]
    PostRecv {
        /// Chain index of the first request that was not posted.
        bad_index: usize,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A send was rejected.
    #[error("failed post_send")]
    PostSend(#[source] io::Error),

    /// A packet pacing update was rejected.
    #[error("failed to modify QP rate limit")]
    RateLimit(#[source] io::Error),

    /// The operation needs a queue pair, but none was created.
    #[error("QP is not configured")]
    NotConfigured,
}

impl QpError {
    /// Determine whether the owning transport cannot continue with this
    /// queue pair. Such errors are surfaced rather than handled so that the
    /// caller decides between exiting and rebuilding the transport.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Transition { .. } | Self::PostRecv { .. })
    }
}

/// An owned hardware queue pair. Destroyed on drop.
pub struct Qp {
    ctx: Arc<dyn DeviceContext>,
    handle: QpHandle,
    qp_type: QpType,
    port: PortNum,
}

impl fmt::Debug for Qp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle)
    }
}

impl Qp {
    /// Create a queue pair on the given device.
    pub fn create(
        ctx: &Arc<dyn DeviceContext>,
        init_attr: &QpInitAttr,
        port: PortNum,
    ) -> Result<Self, QpError> {
        let handle = ctx.create_qp(init_attr).map_err(|e| {
            log::error!("qpm: ibv_create_qp failed: {}", e);
            QpError::QpCreation(e)
        })?;
        Ok(Self {
            ctx: ctx.clone(),
            handle,
            qp_type: init_attr.qp_type,
            port,
        })
    }

    /// Get the hardware handle.
    #[inline]
    pub fn handle(&self) -> QpHandle {
        self.handle
    }

    /// Get the QP number.
    #[inline]
    pub fn qp_num(&self) -> Qpn {
        self.handle.qpn
    }

    /// Get the QP type.
    #[inline]
    pub fn qp_type(&self) -> QpType {
        self.qp_type
    }

    /// Get the physical port the QP is bound to.
    #[inline]
    pub fn port(&self) -> PortNum {
        self.port
    }

    /// Query the current state. Report [`QpState::Unknown`] if the query
    /// fails.
    pub fn state(&self) -> QpState {
        self.ctx.query_qp_state(self.handle).unwrap_or_else(|e| {
            log::debug!("qpm: failed to query state of {}: {}", self.handle, e);
            QpState::Unknown
        })
    }

    /// Query the capabilities the device granted.
    pub fn query_caps(&self) -> Result<QpCaps, QpError> {
        self.ctx.query_qp_caps(self.handle).map_err(|e| {
            log::error!("qpm: ibv_query_qp failed: {}", e);
            QpError::QueryCaps(e)
        })
    }

    /// Apply a state transition.
    pub fn modify(&self, transition: QpTransition) -> Result<(), QpError> {
        self.ctx
            .modify_qp(self.handle, transition)
            .map_err(|source| QpError::Transition {
                from: self.state(),
                to: transition.target(),
                source,
            })
    }
}

impl Drop for Qp {
    fn drop(&mut self) {
        log::debug!("qpm: destroying {}", self.handle);
        if let Err(e) = self.ctx.destroy_qp(self.handle) {
            // The device is gone when this is EIO; the QP went with it.
            if is_device_io_error(&e) {
                log::debug!("qpm: QP destroy failure: {}", e);
            } else {
                log::warn!("qpm: QP destroy failure: {}", e);
            }
        }
    }
}

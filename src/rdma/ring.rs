//! Ring (transport) interface.
//!
//! A ring owns the buffer pools and the offload configuration of one
//! transport instance; the queue pair manager borrows buffers from it and
//! delegates completion queue creation to it.

use std::os::fd::RawFd;
use std::sync::Arc;

use super::buf::*;
use super::context::DeviceContext;
use super::cq::*;
use super::qp::TransportType;
use super::type_alias::*;

/// The transport a queue pair belongs to.
pub trait Ring: Send + Sync {
    /// Get the link-layer transport type.
    fn transport_type(&self) -> TransportType;

    /// Determine whether TCP segmentation offload is enabled.
    fn is_tso(&self) -> bool;

    /// Get the maximum header size for segmentation offload.
    fn max_tso_header_size(&self) -> u32;

    /// Determine whether the optimized polling mode is enabled, which
    /// restricts receive work requests to a single SGE.
    fn is_socketxtreme(&self) -> bool;

    /// Get the local key of the transmit buffer memory region.
    fn tx_lkey(&self) -> LKey;

    /// Get the transmit completion notification channel descriptor.
    fn tx_comp_channel(&self) -> Option<RawFd>;

    /// Give a receive buffer back to the ring that owns it.
    fn return_buffer_to_owner_rx(&self, desc: BufferDesc);

    /// Acquire a transmit buffer of regular ring memory, at least
    /// `min_size` bytes long.
    fn acquire_tx_buffer(&self, min_size: u32, urgent: bool) -> Option<BufferDesc>;

    /// Give back a transmit buffer that was acquired but never posted.
    fn return_tx_buffer(&self, desc: BufferDesc);

    /// Adjust the count of transmit buffers handed out without a matching
    /// send accounting.
    fn adjust_missing_buf_refs(&self, delta: i32);

    /// Create a completion queue manager of `num_wr` entries.
    fn create_cq(
        &self,
        ctx: &Arc<dyn DeviceContext>,
        num_wr: u32,
        channel: Option<RawFd>,
        dir: CqDirection,
    ) -> Result<Box<dyn CompletionQueue>, CqCreationError>;
}

use bitflags::bitflags;

use crate::rdma::buf::*;
use crate::rdma::type_alias::*;

use super::Sge;

bitflags! {
    /// Hardware send flags of a work request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SendFlags: u32 {
        /// Request a completion for this work request.
        const SIGNALED = 1 << 1;
        /// Copy the payload into the work request.
        const INLINE = 1 << 3;
        /// Offload IP and L4 checksum calculation.
        const IP_CSUM = 1 << 4;
    }
}

bitflags! {
    /// Per-packet transmit attributes chosen by the caller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TxPacketAttr: u32 {
        /// Compute the L3 checksum.
        const L3_CSUM = 1 << 0;
        /// Compute the L4 checksum.
        const L4_CSUM = 1 << 1;
    }
}

/// Send work request.
///
/// The same request value may be reused by the caller across sends; the
/// manager never leaves [`SendFlags::SIGNALED`] set on it after posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendWr {
    /// Work request identifier.
    pub wr_id: WrId,

    /// Scatter/gather list.
    pub sgl: Vec<Sge>,

    /// Send flags.
    pub flags: SendFlags,

    /// Whether the payload lives in a zero-copy buffer.
    pub zero_copy: bool,
}

impl SendWr {
    /// Create an empty send work request.
    pub fn new(wr_id: WrId) -> Self {
        Self {
            wr_id,
            sgl: Vec::new(),
            flags: SendFlags::empty(),
            zero_copy: false,
        }
    }

    /// Create a send work request that transmits the first `len` bytes of
    /// the given buffer.
    pub fn for_buffer(desc: &BufferDesc, len: u32) -> Self {
        Self {
            wr_id: desc.id.wr_id(),
            sgl: vec![Sge {
                addr: desc.addr,
                length: len.min(desc.len),
                lkey: desc.lkey,
            }],
            flags: SendFlags::empty(),
            zero_copy: desc.is_zcopy(),
        }
    }

    /// Append a scatter/gather entry.
    pub fn sge(mut self, sge: Sge) -> Self {
        self.sgl.push(sge);
        self
    }

    /// Determine whether this request asks for a completion.
    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.flags.contains(SendFlags::SIGNALED)
    }

    /// Get the total payload length.
    pub fn payload_len(&self) -> u64 {
        self.sgl.iter().map(|sge| sge.length as u64).sum()
    }
}

//! Buffer descriptors and the process-wide buffer pool interface.
//!
//! A [`BufferDesc`] is a *handle* into the pool's descriptor table, not an
//! owner of memory. Whoever holds the handle is responsible for returning it,
//! either to the ring that owns it or to the global [`BufferPool`]; the queue
//! pair manager only ever borrows descriptors between posting and release.

use std::collections::VecDeque;
use std::{fmt, slice};

use bitflags::bitflags;

use super::type_alias::*;

/// Identifier of a buffer descriptor in the pool's descriptor table.
///
/// Work requests carry this value as their [`WrId`], so completions can be
/// mapped back to descriptors without embedding pointers in
/// hardware-visible structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BufId(pub u64);

impl BufId {
    /// Get the work request identifier that stands for this buffer.
    #[inline]
    pub const fn wr_id(self) -> WrId {
        self.0
    }
}

impl fmt::Display for BufId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

bitflags! {
    /// Per-descriptor flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BufFlags: u32 {
        /// Application-owned memory handed directly to the hardware. The
        /// application must learn about its completion promptly.
        const ZCOPY = 1 << 0;
    }
}

/// Descriptor of one registered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Handle in the descriptor table.
    pub id: BufId,

    /// Start address of the buffer memory.
    pub addr: u64,

    /// Length of the buffer memory in bytes.
    pub len: u32,

    /// Local key of the memory region the buffer lives in.
    pub lkey: LKey,

    /// Whether a ring owns this descriptor. Descriptors without an owner
    /// belong to the global pool.
    pub owned_by_ring: bool,

    /// Descriptor flags.
    pub flags: BufFlags,
}

impl BufferDesc {
    /// Determine whether this is a zero-copy buffer.
    #[inline]
    pub fn is_zcopy(&self) -> bool {
        self.flags.contains(BufFlags::ZCOPY)
    }

    /// Get the buffer memory as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// - `addr..addr + len` must be valid, writable memory for the lifetime
    ///   of the returned slice.
    /// - The caller must hold this descriptor exclusively, i.e., the buffer
    ///   is neither posted to hardware nor referenced elsewhere.
    #[inline]
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        slice::from_raw_parts_mut(self.addr as usize as *mut u8, self.len as usize)
    }
}

/// Queue of buffer descriptors handed between the completion queue
/// collaborator and the queue pair manager.
pub type DescQueue = VecDeque<BufferDesc>;

/// The process-wide receive buffer pool.
///
/// Implementations must be thread-safe: descriptors may be returned from any
/// thread that tears down a queue pair.
pub trait BufferPool: Send + Sync {
    /// Return a batch of descriptors to the pool.
    fn put_buffers_thread_safe(&self, bufs: Vec<BufferDesc>);

    /// Get the number of free descriptors, for diagnostics.
    fn free_count(&self) -> usize;

    /// Record that `to` was posted right after `from`, so that the consumer of
    /// `from`'s completion may prefetch `to`'s memory. `None` terminates the
    /// chain.
    fn link_prefetch(&self, from: BufId, to: Option<BufId>);
}

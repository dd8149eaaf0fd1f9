use crate::rdma::buf::*;
use crate::rdma::type_alias::*;

use super::Sge;

/// Receive work request.
///
/// Receive work requests form a singly-linked chain inside a slice: `next`
/// holds the index of the following request in the same slice, or `None` at
/// the tail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecvWr {
    /// Work request identifier.
    pub wr_id: WrId,

    /// The only scatter/gather entry.
    pub sge: Sge,

    /// Index of the next work request in the chain.
    pub next: Option<usize>,
}

/// Iterator over a chain of receive work requests.
pub struct RecvChain<'a> {
    wrs: &'a [RecvWr],
    cur: Option<usize>,
}

impl<'a> Iterator for RecvChain<'a> {
    type Item = (usize, &'a RecvWr);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let wr = self.wrs.get(idx)?;
        self.cur = wr.next;
        Some((idx, wr))
    }
}

/// Walk the chain that starts at `wrs[0]`, yielding each request with its
/// index.
pub fn recv_chain(wrs: &[RecvWr]) -> RecvChain<'_> {
    RecvChain {
        wrs,
        cur: (!wrs.is_empty()).then_some(0),
    }
}

/// Fixed-capacity batch of receive work requests.
///
/// Descriptors are written into consecutive slots; the batch is handed to the
/// hardware as one chain once the last slot is filled. The batch borrows the
/// descriptors it holds and never frees them: unposted descriptors, including
/// the tail of a chain the hardware rejected, are given back through
/// [`Self::drain_unposted`].
pub struct RecvBatch {
    /// Hardware-facing work requests, pre-linked into a chain.
    wrs: Box<[RecvWr]>,

    /// Descriptors written into each slot.
    descs: Box<[Option<BufferDesc>]>,

    /// Index of the next free slot.
    curr: usize,

    /// Descriptors of rejected chains that never reached the hardware.
    stranded: Vec<BufferDesc>,
}

impl RecvBatch {
    /// Create a batch with the given number of slots.
    ///
    /// # Panics
    ///
    /// Panic if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "receive batch must have at least one slot");
        let mut batch = Self {
            wrs: vec![RecvWr::default(); capacity].into_boxed_slice(),
            descs: vec![None; capacity].into_boxed_slice(),
            curr: 0,
            stranded: Vec::new(),
        };
        batch.prelink();
        batch
    }

    /// Link every slot to its successor (the last one to nothing) and rewind
    /// the fill index.
    pub fn prelink(&mut self) {
        let n = self.wrs.len();
        for (i, wr) in self.wrs.iter_mut().enumerate() {
            wr.next = (i + 1 < n).then_some(i + 1);
        }
        self.curr = 0;
    }

    /// Get the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.wrs.len()
    }

    /// Get the number of filled, not yet posted slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.curr
    }

    /// Determine whether no slot is filled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.curr == 0
    }

    /// Write a descriptor into the next free slot.
    ///
    /// Return `true` if this filled the last slot; the caller must then post
    /// the whole chain. The fill index is rewound in that case, so the batch
    /// is immediately reusable whatever the outcome of the post.
    pub fn push(&mut self, desc: BufferDesc) -> bool {
        let idx = self.curr;
        let wr = &mut self.wrs[idx];
        wr.wr_id = desc.id.wr_id();
        wr.sge = Sge::from(&desc);
        self.descs[idx] = Some(desc);

        if idx + 1 == self.wrs.len() {
            self.curr = 0;
            true
        } else {
            self.curr += 1;
            false
        }
    }

    /// Get the chain for posting.
    #[inline]
    pub fn chain_mut(&mut self) -> &mut [RecvWr] {
        &mut self.wrs
    }

    /// Get the chain.
    #[inline]
    pub fn chain(&self) -> &[RecvWr] {
        &self.wrs
    }

    /// Re-link the request at `bad_index` to its successor after the
    /// hardware rejected the chain at that position, so that the unposted
    /// remainder stays a valid chain.
    pub fn repair(&mut self, bad_index: usize) {
        if bad_index + 1 < self.wrs.len() {
            self.wrs[bad_index].next = Some(bad_index + 1);
        }
    }

    /// Set aside the descriptors from `bad_index` to the end of a chain the
    /// hardware rejected at that position. They are returned by the next
    /// [`Self::drain_unposted`].
    pub fn reclaim_from(&mut self, bad_index: usize) {
        for slot in self.descs.iter_mut().skip(bad_index) {
            if let Some(desc) = slot.take() {
                self.stranded.push(desc);
            }
        }
    }

    /// Get the number of descriptors set aside by [`Self::reclaim_from`].
    #[inline]
    pub fn stranded(&self) -> usize {
        self.stranded.len()
    }

    /// Take every descriptor written since the last post, most recent first,
    /// followed by those of rejected chains, and rewind the fill index.
    pub fn drain_unposted(&mut self) -> Vec<BufferDesc> {
        let mut out = Vec::with_capacity(self.curr + self.stranded.len());
        while self.curr > 0 {
            self.curr -= 1;
            if let Some(desc) = self.descs[self.curr].take() {
                out.push(desc);
            }
        }
        out.append(&mut self.stranded);
        out
    }
}

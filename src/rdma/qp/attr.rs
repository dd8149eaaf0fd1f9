use std::fmt;

use super::QpType;
use crate::rdma::verbs::CqHandle;

/// Minimum number of work requests a queue is ever sized to.
pub const MIN_QP_WR: u32 = 32;

/// Number of descriptor building blocks (WQEBBs) the hardware can give a
/// send queue at most.
pub const MAX_SQ_WQEBBS: u32 = 32678;

/// Size of one descriptor building block in bytes.
pub const WQEBB_SIZE: u32 = 64;

/// Largest send descriptor that still lets the send queue hold
/// [`MIN_QP_WR`] requests within the WQEBB budget.
pub const MAX_WQE_SIZE: u32 = MAX_SQ_WQEBBS * WQEBB_SIZE / MIN_QP_WR;

/// Header room assumed per send descriptor when segmentation offload is off.
pub const DEFAULT_INLINE_HEADER_ROOM: u32 = 94;

/// Round a work request count down to a multiple of 16, but never below
/// [`MIN_QP_WR`].
#[inline]
pub const fn align_wr_down(num_wr: u32) -> u32 {
    let aligned = num_wr & !0xf;
    if aligned < MIN_QP_WR {
        MIN_QP_WR
    } else {
        aligned
    }
}

/// The largest receive work request count that can be requested from a
/// device that reports `device_max_qp_wr`.
#[inline]
pub const fn max_rx_wr_for_device(device_max_qp_wr: u32) -> u32 {
    align_wr_down(device_max_qp_wr.saturating_sub(1))
}

/// Queue pair capability attributes.
///
/// The manager tracks these through three stages: *requested* (from
/// configuration), *negotiated* (after device limits and the send queue
/// budget are applied), and *actual* (as reported by the device after
/// creation). Each stage is field-wise no larger than the previous one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QpCaps {
    /// Maximum outstanding work requests in the send queue.
    pub max_send_wr: u32,

    /// Maximum outstanding work requests in the receive queue.
    pub max_recv_wr: u32,

    /// Maximum scatter/gather entries per send work request.
    pub max_send_sge: u32,

    /// Maximum scatter/gather entries per receive work request.
    pub max_recv_sge: u32,

    /// Maximum bytes that can be posted inline to the send queue.
    pub max_inline_data: u32,
}

impl QpCaps {
    /// Estimate the largest send descriptor the hardware may need to build
    /// for these capabilities, in bytes.
    ///
    /// Accounts for the control and Ethernet segments, one data pointer per
    /// SGE, the inline payload with its size field, and the inlined header
    /// (the segmentation offload header size if `tso_header` is set).
    /// Saturates at `u32::MAX`.
    pub fn max_wqe_size(&self, tso_header: Option<u32>) -> u32 {
        (16 + 14 + 4u32)
            .saturating_add(self.max_send_sge.saturating_mul(16))
            .saturating_add(self.max_inline_data)
            .saturating_add(tso_header.unwrap_or(DEFAULT_INLINE_HEADER_ROOM))
    }

    /// Limit `max_send_wr` to what the send queue descriptor budget can hold
    /// with descriptors of [`Self::max_wqe_size`]. Return the new value if
    /// it was lowered.
    pub fn cap_by_wqebb_budget(&mut self, tso_header: Option<u32>) -> Option<u32> {
        let wqe_size = self.max_wqe_size(tso_header).max(1);
        let num_wr = MAX_SQ_WQEBBS * WQEBB_SIZE / wqe_size;
        log::debug!(
            "qpm: calculated max_wqe_sz={} num_wr={}",
            wqe_size,
            num_wr
        );
        if num_wr < self.max_send_wr {
            self.max_send_wr = num_wr;
            Some(num_wr)
        } else {
            None
        }
    }

    /// Clamp every field down to the corresponding field of `actual`.
    /// Fields are never raised.
    pub fn clamp_to(&self, actual: &QpCaps) -> QpCaps {
        QpCaps {
            max_send_wr: self.max_send_wr.min(actual.max_send_wr),
            max_recv_wr: self.max_recv_wr.min(actual.max_recv_wr),
            max_send_sge: self.max_send_sge.min(actual.max_send_sge),
            max_recv_sge: self.max_recv_sge.min(actual.max_recv_sge),
            max_inline_data: self.max_inline_data.min(actual.max_inline_data),
        }
    }

    /// Determine whether every field is no larger than in `other`.
    pub fn fits_within(&self, other: &QpCaps) -> bool {
        self.max_send_wr <= other.max_send_wr
            && self.max_recv_wr <= other.max_recv_wr
            && self.max_send_sge <= other.max_send_sge
            && self.max_recv_sge <= other.max_recv_sge
            && self.max_inline_data <= other.max_inline_data
    }
}

impl fmt::Display for QpCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wre: tx = {} rx = {} sge: tx = {} rx = {} inline: {}",
            self.max_send_wr,
            self.max_recv_wr,
            self.max_send_sge,
            self.max_recv_sge,
            self.max_inline_data
        )
    }
}

/// Queue pair initialization attributes.
#[derive(Debug, Clone)]
pub struct QpInitAttr {
    /// Send completion queue for this QP.
    pub send_cq: CqHandle,

    /// Receive completion queue for this QP.
    pub recv_cq: CqHandle,

    /// Requested capabilities.
    pub caps: QpCaps,

    /// Queue pair type.
    pub qp_type: QpType,

    /// Whether to signal for all send work requests.
    pub sq_sig_all: bool,

    /// Maximum header size for segmentation offload, if enabled.
    pub max_tso_header: Option<u32>,
}

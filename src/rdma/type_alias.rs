//! Type aliases for RDMA-related identifiers.

/// Port number is a [`u8`] that identifies a port on a local HCA.
pub type PortNum = u8;

/// QP number (QPN) is a [`u32`] that identifies a local queue pair.
pub type Qpn = u32;

/// Local key (LKey) is a [`u32`] that identifies a local memory region.
pub type LKey = u32;

/// Work request identifier (WrId) is a [`u64`] that identifies a posted work
/// request. This crate always sets it to the [`BufId`](crate::rdma::buf::BufId)
/// of the buffer the request refers to.
pub type WrId = u64;

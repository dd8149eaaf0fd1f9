//! Work requests.

mod recv;
mod send;

pub use self::recv::*;
pub use self::send::*;

use super::buf::BufferDesc;
use super::type_alias::LKey;

/// Scatter/gather entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sge {
    /// Start address.
    pub addr: u64,

    /// Length in bytes.
    pub length: u32,

    /// Local key of the memory region.
    pub lkey: LKey,
}

impl From<&BufferDesc> for Sge {
    fn from(desc: &BufferDesc) -> Self {
        Self {
            addr: desc.addr,
            length: desc.len,
            lkey: desc.lkey,
        }
    }
}

//! Transmit packet pacing.

use bitflags::bitflags;

/// Packet pacing configuration of a queue pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    /// Rate in Kbps. Zero disables pacing.
    pub rate: u32,

    /// Maximum burst size in bytes.
    pub max_burst_size: u32,

    /// Typical packet size in bytes.
    pub typical_pkt_size: u16,
}

bitflags! {
    /// Which fields of a [`RateLimit`] differ from the applied one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RateLimitChanges: u32 {
        /// `rate` changed.
        const RATE = 1 << 0;
        /// `max_burst_size` changed.
        const BURST_SIZE = 1 << 1;
        /// `typical_pkt_size` changed.
        const PKT_SIZE = 1 << 2;
    }
}

impl RateLimit {
    /// Compare against `other` field by field.
    pub fn diff(&self, other: &RateLimit) -> RateLimitChanges {
        let mut changes = RateLimitChanges::empty();
        if self.rate != other.rate {
            changes |= RateLimitChanges::RATE;
        }
        if self.max_burst_size != other.max_burst_size {
            changes |= RateLimitChanges::BURST_SIZE;
        }
        if self.typical_pkt_size != other.typical_pkt_size {
            changes |= RateLimitChanges::PKT_SIZE;
        }
        changes
    }
}

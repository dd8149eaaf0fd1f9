use std::fmt;

/// Queue pair type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpType {
    /// Raw packet (or Raw Ethernet).
    RawPacket,
}

impl fmt::Display for QpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawPacket => f.write_str("RAW_PACKET"),
        }
    }
}

/// Link-layer transport a ring runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// Ethernet (RoCE or raw Ethernet).
    Ethernet,

    /// InfiniBand.
    Infiniband,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ethernet => f.write_str("ETH"),
            Self::Infiniband => f.write_str("IB"),
        }
    }
}

//! Device context.

use std::io;
use std::os::fd::RawFd;
use std::sync::OnceLock;

use regex::Regex;

use super::verbs::Verbs;

/// Device attributes relevant to queue pair sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAttr {
    /// Maximum number of outstanding work requests on any queue.
    pub max_qp_wr: u32,

    /// Maximum number of scatter/gather entries per work request.
    pub max_sge: u32,

    /// Maximum number of entries in a completion queue.
    pub max_cqe: u32,
}

/// Device family, derived from the device name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    /// ConnectX-3 family, driven by `mlx4`.
    Mlx4,

    /// ConnectX-4 and later, driven by `mlx5`.
    Mlx5,

    /// Anything else.
    Other,
}

impl DeviceModel {
    /// Identify the device family from a verbs device name such as `mlx5_0`.
    pub fn of(name: &str) -> Self {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^mlx(?P<gen>[45])_\d+$").expect("invalid device name pattern")
        });

        match re.captures(name).and_then(|c| c.name("gen")) {
            Some(m) if m.as_str() == "4" => Self::Mlx4,
            Some(_) => Self::Mlx5,
            None => Self::Other,
        }
    }
}

/// Handle of an opened RDMA device.
///
/// The device context is shared by every queue pair opened on it; it
/// provides the verbs primitives, the device limits, and the device
/// removal flag consulted by drain loops.
pub trait DeviceContext: Verbs {
    /// Get the device name (e.g., `mlx5_0`).
    fn name(&self) -> &str;

    /// Get the device attributes.
    fn attr(&self) -> DeviceAttr;

    /// Determine whether the device has been hot-unplugged.
    fn is_removed(&self) -> bool;

    /// Get the descriptor of the asynchronous event channel.
    fn async_fd(&self) -> RawFd;

    /// Query the number of ports in the device's link aggregation group.
    fn num_lag_ports(&self) -> io::Result<u8>;

    /// Get the device family.
    fn model(&self) -> DeviceModel {
        DeviceModel::of(self.name())
    }
}

//! Flow steering rules.
//!
//! Only rule *construction* lives here: the caller describes the packets to
//! steer with [`FlowAttr`], and the verbs provider installs the rule. Which
//! packets actually match is up to the hardware.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use super::context::DeviceContext;
use super::type_alias::*;
use super::verbs::FlowHandle;

/// One match specification of a flow rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSpec {
    /// Match on the Ethernet header.
    Eth {
        /// Destination MAC address.
        dst_mac: [u8; 6],
        /// VLAN identifier, if tagged.
        vlan: Option<u16>,
    },

    /// Match on the IPv4 header.
    Ipv4 {
        /// Source address; unspecified matches any.
        src: Ipv4Addr,
        /// Destination address; unspecified matches any.
        dst: Ipv4Addr,
    },

    /// Match on TCP ports. Zero matches any.
    Tcp {
        /// Source port.
        src_port: u16,
        /// Destination port.
        dst_port: u16,
    },

    /// Match on UDP ports. Zero matches any.
    Udp {
        /// Source port.
        src_port: u16,
        /// Destination port.
        dst_port: u16,
    },
}

/// Attributes of a flow steering rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowAttr {
    /// Physical port the rule applies to.
    pub port: PortNum,

    /// Rule priority; lower is matched first.
    pub priority: u16,

    /// Match specifications, outermost header first.
    pub specs: Vec<FlowSpec>,
}

impl FlowAttr {
    /// Create an empty rule for the given port.
    pub fn new(port: PortNum) -> Self {
        Self {
            port,
            priority: 0,
            specs: Vec::new(),
        }
    }

    /// Set the rule priority.
    pub fn priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Append a match specification.
    pub fn spec(mut self, spec: FlowSpec) -> Self {
        self.specs.push(spec);
        self
    }
}

/// Context of an advanced receive offload object (a transport interface
/// receive object) that a rule may target instead of a queue pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffloadContext {
    /// Object identifier assigned by the device.
    pub tir_num: u32,
}

/// An installed flow steering rule. Removed from the device on drop.
pub struct FlowRule {
    ctx: Arc<dyn DeviceContext>,
    handle: FlowHandle,
}

impl fmt::Debug for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowRule<{:#x}>", self.handle.0)
    }
}

impl FlowRule {
    pub(crate) fn new(ctx: Arc<dyn DeviceContext>, handle: FlowHandle) -> Self {
        Self { ctx, handle }
    }

    /// Get the hardware handle of this rule.
    #[inline]
    pub fn handle(&self) -> FlowHandle {
        self.handle
    }
}

impl Drop for FlowRule {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.destroy_flow(self.handle) {
            log::warn!("qpm: failed to destroy flow rule {:?}: {}", self, e);
        }
    }
}

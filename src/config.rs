//! Queue pair manager configuration.

use std::io::prelude::*;
use std::path::Path;
use std::{fs, io};

use serde::Deserialize;
use thiserror::Error;

use crate::rdma::qp::{QpCaps, MAX_WQE_SIZE};

/// Hypervisor the process runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hypervisor {
    /// Bare metal, or unknown.
    #[default]
    None,
    /// KVM.
    Kvm,
    /// Xen.
    Xen,
    /// VMware.
    Vmware,
    /// Microsoft Hyper-V.
    Mshv,
}

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration file")]
    Io(#[from] io::Error),

    /// The configuration file is not valid TOML or has mistyped fields.
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value the manager cannot work with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables of queue pair managers.
///
/// Every field has a default, so a configuration file only needs to list
/// the fields it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QpConfig {
    /// Number of receive work requests to request.
    pub rx_num_wr: u32,

    /// Number of receive buffers collected before they are posted in one
    /// call.
    pub rx_num_wr_to_post_recv: u32,

    /// Send signaling period: one send in every this many requests a
    /// completion.
    pub tx_num_wr_to_signal: u32,

    /// Bytes to prefetch from the next receive buffer before polling. Any
    /// non-zero value makes the manager record posting order for prefetch.
    pub rx_prefetch_bytes_before_poll: u32,

    /// Bytes of inline data to request for the send queue.
    pub tx_max_inline: u32,

    /// Scatter/gather entries per send request when segmentation offload is
    /// disabled.
    pub tx_num_sge: u32,

    /// Scatter/gather entries per receive request when the optimized polling
    /// mode is disabled.
    pub rx_num_sge: u32,

    /// The hypervisor the process runs under.
    pub hypervisor: Hypervisor,

    /// Pause between receive drain passes, in microseconds.
    pub rx_drain_interval_us: u64,

    /// Pause after forcing the final send completion on teardown, in
    /// microseconds.
    pub down_settle_us: u64,
}

impl Default for QpConfig {
    fn default() -> Self {
        Self {
            rx_num_wr: 16000,
            rx_num_wr_to_post_recv: 64,
            tx_num_wr_to_signal: 64,
            rx_prefetch_bytes_before_poll: 0,
            tx_max_inline: 204,
            tx_num_sge: 4,
            rx_num_sge: 1,
            hypervisor: Hypervisor::None,
            rx_drain_interval_us: 500,
            down_settle_us: 1000,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    qpmgr: Option<QpConfig>,
}

impl QpConfig {
    /// Parse the `[qpmgr]` table of a TOML document. A document without the
    /// table yields the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(s)?;
        let config = file.qpmgr.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Load the `[qpmgr]` table of a TOML configuration file.
    pub fn load_toml(config_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut file = fs::File::open(config_file)?;
        let mut toml_str = String::new();
        file.read_to_string(&mut toml_str)?;
        Self::from_toml_str(&toml_str)
    }

    /// Check that the manager can operate with this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rx_num_wr_to_post_recv == 0 {
            return Err(ConfigError::Invalid(
                "rx_num_wr_to_post_recv must be positive".to_string(),
            ));
        }
        if self.tx_num_wr_to_signal == 0 {
            return Err(ConfigError::Invalid(
                "tx_num_wr_to_signal must be positive".to_string(),
            ));
        }
        if self.rx_num_wr_to_post_recv > self.rx_num_wr {
            return Err(ConfigError::Invalid(format!(
                "rx_num_wr_to_post_recv ({}) exceeds rx_num_wr ({})",
                self.rx_num_wr_to_post_recv, self.rx_num_wr
            )));
        }

        let send_caps = QpCaps {
            max_send_sge: self.tx_num_sge,
            max_inline_data: self.tx_max_inline,
            ..QpCaps::default()
        };
        let wqe_size = send_caps.max_wqe_size(None);
        if wqe_size > MAX_WQE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "tx_max_inline ({}) and tx_num_sge ({}) need {}-byte send descriptors, more than {}",
                self.tx_max_inline, self.tx_num_sge, wqe_size, MAX_WQE_SIZE
            )));
        }
        Ok(())
    }

    /// Number of sends that may go unsignaled between two signaled ones.
    #[inline]
    pub fn tx_unsignaled_threshold(&self) -> u32 {
        self.tx_num_wr_to_signal.saturating_sub(1)
    }
}

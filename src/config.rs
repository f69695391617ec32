//! Service Configuration
//!
//! Loaded from an optional YAML file, then overridden by command line flags.
//! `validate()` repairs empty or zero values instead of rejecting them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_ADDR: &str = "0.0.0.0:10044";
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HISTORY_DAYS: u32 = 7;
pub const DEFAULT_RETENTION_DAYS: u32 = 365;

// =============================================================================
// Configuration Types
// =============================================================================

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub server: ServerConfig,
    pub collector: CollectorConfig,
    /// Lower bound of history queries that give none, in days before now
    pub history_default_days: u32,
    /// smartctl binary name or path
    pub smartctl_path: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            collector: CollectorConfig::default(),
            history_default_days: DEFAULT_HISTORY_DAYS,
            smartctl_path: crate::hardware::discovery::DEFAULT_TOOL.to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}

/// Background collector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub enabled: bool,
    /// Seconds between sweeps
    pub interval_secs: u64,
    /// Directory holding the per-serial history logs
    pub data_dir: PathBuf,
    /// Compact history to this many days after every sweep; `None` keeps all
    pub retention_days: Option<u32>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_INTERVAL_SECS,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            retention_days: Some(DEFAULT_RETENTION_DAYS),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Replace empty or zero settings with their defaults
    pub fn validate(&mut self) -> &mut Self {
        if self.server.addr.trim().is_empty() {
            warn!("Empty server address, using {}", DEFAULT_ADDR);
            self.server.addr = DEFAULT_ADDR.to_string();
        }
        if self.collector.interval_secs == 0 {
            warn!("Zero collector interval, using {}s", DEFAULT_INTERVAL_SECS);
            self.collector.interval_secs = DEFAULT_INTERVAL_SECS;
        }
        if self.collector.data_dir.as_os_str().is_empty() {
            self.collector.data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        }
        if self.history_default_days == 0 {
            self.history_default_days = DEFAULT_HISTORY_DAYS;
        }
        if self.smartctl_path.trim().is_empty() {
            self.smartctl_path = crate::hardware::discovery::DEFAULT_TOOL.to_string();
        }
        self
    }
}

//! Device Scanner
//!
//! Enumerates SMART-capable devices. smartctl's own bulk scan is the primary
//! source; on Linux, block devices it missed (typically drives behind USB
//! bridges) are recovered from sysfs and confirmed with a probe.

use crate::domain::ports::{Device, DiskMetadataProviderRef, DriveType};
use crate::error::{Error, Result};
use crate::hardware::discovery::prober::TransportProber;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

// =============================================================================
// Scanner Configuration
// =============================================================================

/// Configuration for the device scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Path to sysfs (for testing)
    pub sysfs_path: PathBuf,
    /// Recover devices from sysfs that the bulk scan missed
    pub fallback_scan: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sysfs_path: PathBuf::from("/sys"),
            fallback_scan: cfg!(target_os = "linux"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ScanOutput {
    #[serde(default)]
    devices: Vec<ScanEntry>,
}

#[derive(Debug, Deserialize)]
struct ScanEntry {
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
}

impl ScanEntry {
    /// Optical drives show up as generic SCSI devices without a disk name
    fn is_optical(&self) -> bool {
        self.kind.contains("scsi") && !self.name.contains("sd")
    }
}

// =============================================================================
// Device Scanner
// =============================================================================

/// Discovers candidate devices on the local host
pub struct DeviceScanner {
    config: ScannerConfig,
    prober: TransportProber,
    metadata: DiskMetadataProviderRef,
}

impl DeviceScanner {
    pub fn new(
        config: ScannerConfig,
        prober: TransportProber,
        metadata: DiskMetadataProviderRef,
    ) -> Self {
        Self {
            config,
            prober,
            metadata,
        }
    }

    /// Discover all candidate devices, deduplicated by path
    pub async fn discover(&self) -> Result<Vec<Device>> {
        let mut found: IndexMap<String, ()> = IndexMap::new();

        match self.bulk_scan().await {
            Ok(paths) => {
                debug!("Bulk scan reported {} devices", paths.len());
                for path in paths {
                    found.insert(path, ());
                }
            }
            Err(e @ Error::ToolNotInstalled { .. }) => return Err(e),
            Err(e) => warn!("Bulk device scan failed: {}", e),
        }

        if self.config.fallback_scan {
            for path in self.sysfs_candidates() {
                if found.contains_key(&path) {
                    continue;
                }
                if self.prober.can_read(&path).await {
                    debug!(device = %path, "Recovered device from sysfs");
                    found.insert(path, ());
                }
            }
        }

        let mut devices = Vec::with_capacity(found.len());
        for path in found.into_keys() {
            devices.push(self.describe(path).await);
        }

        info!("Discovered {} devices", devices.len());
        Ok(devices)
    }

    async fn describe(&self, path: String) -> Device {
        let metadata = self.metadata.describe(&path).await;
        let mut device = Device::new(path);
        device.device_type = detect_device_type(&device.name);
        device.capacity_gb = metadata.capacity_gb;
        device.is_external = metadata.is_external;
        device
    }

    /// Run `smartctl --scan-open -j` and return the non-optical device paths
    async fn bulk_scan(&self) -> Result<Vec<String>> {
        let output = match self
            .prober
            .runner()
            .run(self.prober.tool(), &["--scan-open", "-j"])
            .await
        {
            Ok(output) => output,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ToolNotInstalled {
                    tool: self.prober.tool().to_string(),
                    hint: crate::hardware::discovery::prober::install_hint().to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let scan: ScanOutput = serde_json::from_slice(&output.stdout)?;
        Ok(scan
            .devices
            .into_iter()
            .filter(|entry| {
                let optical = entry.is_optical();
                if optical {
                    debug!(device = %entry.name, "Skipping optical drive");
                }
                !optical
            })
            .map(|entry| entry.name)
            .collect())
    }

    /// Whole-disk `sd*` devices listed under sysfs
    fn sysfs_candidates(&self) -> Vec<String> {
        let pattern = self.config.sysfs_path.join("block").join("sd*");
        let Some(pattern) = pattern.to_str() else {
            return Vec::new();
        };

        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Invalid sysfs pattern {}: {}", pattern, e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .filter(|name| !is_partition(name))
            .map(|name| format!("/dev/{}", name))
            .collect()
    }
}

/// Whether a kernel block device name denotes a partition (`sda1`)
pub fn is_partition(name: &str) -> bool {
    name.len() >= 4 && name.ends_with(|c: char| c.is_ascii_digit())
}

/// Coarse type from the device path alone; refined once the device is probed
pub fn detect_device_type(path: &str) -> DriveType {
    if path.contains("nvme") {
        DriveType::Nvme
    } else {
        DriveType::Unknown
    }
}

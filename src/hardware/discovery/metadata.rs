//! Disk Metadata
//!
//! Best-effort capacity and enclosure detection using whatever the host
//! platform offers: sysfs and udev on Linux, `diskutil` on macOS, `wmic` on
//! Windows. Every failure degrades to zero capacity and "internal".

use crate::domain::ports::{DiskMetadata, DiskMetadataProvider, ProcessRunnerRef};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

const SECTOR_SIZE: u64 = 512;
const GIB: u64 = 1024 * 1024 * 1024;

// =============================================================================
// System Metadata Provider
// =============================================================================

/// Host platform metadata provider
pub struct SystemDiskMetadata {
    runner: ProcessRunnerRef,
    sysfs_path: PathBuf,
}

impl SystemDiskMetadata {
    pub fn new(runner: ProcessRunnerRef) -> Self {
        Self::with_sysfs(runner, "/sys")
    }

    /// Provider reading sysfs from a non-default root
    pub fn with_sysfs(runner: ProcessRunnerRef, sysfs_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            sysfs_path: sysfs_path.into(),
        }
    }

    async fn command_output(&self, program: &str, args: &[&str]) -> Option<String> {
        match self.runner.run(program, args).await {
            Ok(output) if output.success() => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            Ok(output) => {
                debug!(program, exit_code = ?output.exit_code, "Metadata command failed");
                None
            }
            Err(e) => {
                debug!(program, error = %e, "Metadata command could not run");
                None
            }
        }
    }

    async fn describe_linux(&self, device: &str) -> DiskMetadata {
        let base = linux_base_name(device);
        let size_path = self.sysfs_path.join("block").join(&base).join("size");

        let capacity_gb = tokio::fs::read_to_string(&size_path)
            .await
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(sectors_to_gb)
            .unwrap_or(0);

        let name_arg = format!("--name={}", device);
        let is_external = self
            .command_output("udevadm", &["info", "--query=property", &name_arg])
            .await
            .map(|out| udev_reports_external(&out))
            .unwrap_or(false);

        DiskMetadata {
            capacity_gb,
            is_external,
        }
    }

    async fn describe_macos(&self, device: &str) -> DiskMetadata {
        let node = format!("/dev/{}", macos_base_name(device));
        match self.command_output("diskutil", &["info", &node]).await {
            Some(out) => DiskMetadata {
                capacity_gb: diskutil_capacity_gb(&out),
                is_external: diskutil_reports_external(&out),
            },
            None => DiskMetadata::default(),
        }
    }

    async fn describe_windows(&self, device: &str) -> DiskMetadata {
        let index = windows_disk_index(device);
        let filter = format!("Index={}", index);

        let capacity_gb = self
            .command_output("wmic", &["diskdrive", "where", &filter, "get", "Size"])
            .await
            .and_then(|out| wmic_size_bytes(&out))
            .map(|bytes| bytes / GIB)
            .unwrap_or(0);

        let filter = format!("Index={} and InterfaceType='USB'", index);
        let is_external = self
            .command_output("wmic", &["diskdrive", "where", &filter, "get", "DeviceID"])
            .await
            .map(|out| out.lines().skip(1).any(|l| !l.trim().is_empty()))
            .unwrap_or(false);

        DiskMetadata {
            capacity_gb,
            is_external,
        }
    }
}

#[async_trait]
impl DiskMetadataProvider for SystemDiskMetadata {
    async fn describe(&self, device: &str) -> DiskMetadata {
        let metadata = if cfg!(target_os = "linux") {
            self.describe_linux(device).await
        } else if cfg!(target_os = "macos") {
            self.describe_macos(device).await
        } else if cfg!(target_os = "windows") {
            self.describe_windows(device).await
        } else {
            DiskMetadata::default()
        };

        debug!(
            device,
            capacity_gb = metadata.capacity_gb,
            is_external = metadata.is_external,
            "Resolved disk metadata"
        );
        metadata
    }
}

// =============================================================================
// Parsing Helpers
// =============================================================================

/// Whole-disk kernel name for a device path (`/dev/sda1` -> `sda`,
/// `/dev/nvme0n1p2` -> `nvme0n1`)
pub fn linux_base_name(device: &str) -> String {
    let name = device.trim_start_matches("/dev/");
    if name.starts_with("nvme") {
        match name.rfind('p') {
            Some(idx) if idx > "nvme".len() && name[idx + 1..].chars().all(|c| c.is_ascii_digit()) => {
                name[..idx].to_string()
            }
            _ => name.to_string(),
        }
    } else {
        name.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
    }
}

fn sectors_to_gb(sectors: u64) -> u64 {
    sectors.saturating_mul(SECTOR_SIZE) / GIB
}

/// Whether `udevadm info --query=property` output places the device on an
/// external bus
pub fn udev_reports_external(output: &str) -> bool {
    output
        .lines()
        .filter_map(|l| l.trim().strip_prefix("ID_BUS="))
        .any(|bus| bus == "usb" || bus == "firewire")
}

/// diskutil identifier of the whole disk (`/dev/rdisk2s1` -> `disk2`)
pub fn macos_base_name(device: &str) -> String {
    let name = device.trim_start_matches("/dev/");
    let name = name.strip_prefix('r').filter(|n| n.starts_with("disk")).unwrap_or(name);

    match name.strip_prefix("disk") {
        Some(rest) => {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            format!("disk{}", digits)
        }
        None => name.to_string(),
    }
}

/// Capacity from the `Total Size:` line of `diskutil info`
pub fn diskutil_capacity_gb(output: &str) -> u64 {
    for line in output.lines().filter(|l| l.contains("Total Size:")) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        for pair in fields.windows(2) {
            let Ok(size) = pair[0].parse::<f64>() else {
                continue;
            };
            match pair[1] {
                "GB" => return size as u64,
                "TB" => return (size * 1024.0) as u64,
                _ => {}
            }
        }
    }
    0
}

/// Whether `diskutil info` describes an external or removable device
pub fn diskutil_reports_external(output: &str) -> bool {
    output.lines().map(str::trim).any(|line| {
        let Some((key, value)) = line.split_once(':') else {
            return false;
        };
        let value = value.trim();
        match key.trim() {
            "Device Location" => ["External", "USB", "Thunderbolt"].iter().any(|k| value.contains(k)),
            "Protocol" | "Bus Protocol" => ["USB", "FireWire", "Thunderbolt"].iter().any(|k| value.contains(k)),
            "Removable Media" | "External" => value.starts_with("Yes") || value == "Removable",
            _ => false,
        }
    })
}

/// Physical drive index from a Windows device name (`\\.\PhysicalDrive1` -> `1`)
pub fn windows_disk_index(device: &str) -> u32 {
    device
        .rsplit("PhysicalDrive")
        .next()
        .filter(|_| device.contains("PhysicalDrive"))
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(0)
}

/// Byte size from `wmic diskdrive ... get Size` output
pub fn wmic_size_bytes(output: &str) -> Option<u64> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .nth(1)
        .and_then(|l| l.parse().ok())
}

//! Domain Ports - Core types and trait definitions for the telemetry service
//!
//! These traits define the boundaries between the telemetry pipeline and the
//! outside world (external processes, OS metadata, durable storage).
//! Adapters implement these traits to provide concrete functionality.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// History key used for devices that report no serial number.
///
/// Every unidentifiable device shares this key and therefore one history
/// stream. This is a known limitation, kept for compatibility with existing
/// data directories.
pub const UNKNOWN_SERIAL: &str = "unknown";

// =============================================================================
// Device Types
// =============================================================================

/// Coarse drive type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveType {
    #[serde(rename = "HDD")]
    Hdd,
    #[serde(rename = "SSD")]
    Ssd,
    #[serde(rename = "NVMe")]
    Nvme,
    Unknown,
}

impl std::fmt::Display for DriveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveType::Hdd => write!(f, "HDD"),
            DriveType::Ssd => write!(f, "SSD"),
            DriveType::Nvme => write!(f, "NVMe"),
            DriveType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A physical storage device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device path (e.g., /dev/sda), stable within a boot session
    pub name: String,
    /// Model string
    pub model: String,
    /// Serial number, the cross-session identity key
    pub serial: String,
    /// Drive type
    pub device_type: DriveType,
    /// Capacity in GB
    pub capacity_gb: u64,
    /// Whether the device sits in an external enclosure
    pub is_external: bool,
}

impl Device {
    /// A device known only by its path
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: String::new(),
            serial: String::new(),
            device_type: DriveType::Unknown,
            capacity_gb: 0,
            is_external: false,
        }
    }

    /// Key under which this device's history is stored
    pub fn history_key(&self) -> &str {
        let serial = self.serial.trim();
        if serial.is_empty() {
            UNKNOWN_SERIAL
        } else {
            serial
        }
    }
}

/// Capacity and enclosure metadata for a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskMetadata {
    /// Capacity in GB, 0 when unknown
    pub capacity_gb: u64,
    /// External enclosure flag, false when unknown
    pub is_external: bool,
}

// =============================================================================
// Telemetry Types
// =============================================================================

/// Overall SMART self-assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SmartStatus {
    Passed,
    Failed,
    /// The tool reported no self-assessment
    Unknown,
}

impl std::fmt::Display for SmartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmartStatus::Passed => write!(f, "PASSED"),
            SmartStatus::Failed => write!(f, "FAILED"),
            SmartStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A single entry of the ATA SMART attribute table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAttribute {
    pub id: u32,
    pub name: String,
    pub value: i64,
    pub worst: i64,
    pub threshold: i64,
    pub raw_value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when_failed: Option<String>,
}

/// One point-in-time health reading of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub device: Device,
    /// Temperature in Celsius
    pub temperature: i32,
    pub power_on_hours: u64,
    pub power_cycle_count: u64,
    pub reallocated_sectors: u64,
    pub pending_sectors: u64,
    pub uncorrectable_errors: u64,
    /// Derived health, 0..=100
    pub health_percent: u8,
    pub smart_status: SmartStatus,
    /// Raw attribute table (ATA only, empty for NVMe)
    pub attributes: Vec<SmartAttribute>,
    /// Acquisition time, set by the reader rather than the probing tool
    pub timestamp: DateTime<Utc>,
}

impl TelemetrySnapshot {
    /// Project this snapshot onto the durable history row
    pub fn to_history_record(&self) -> HistoryRecord {
        HistoryRecord {
            timestamp: self.timestamp,
            temperature: self.temperature,
            power_on_hours: self.power_on_hours,
            power_cycle_count: self.power_cycle_count,
            reallocated_sectors: self.reallocated_sectors,
            pending_sectors: self.pending_sectors,
            uncorrectable_errors: self.uncorrectable_errors,
            health_percent: self.health_percent,
        }
    }
}

/// Durable projection of a snapshot; identity is implied by the owning log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub temperature: i32,
    pub power_on_hours: u64,
    pub power_cycle_count: u64,
    pub reallocated_sectors: u64,
    pub pending_sectors: u64,
    pub uncorrectable_errors: u64,
    pub health_percent: u8,
}

/// Device entry of the inventory listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(flatten)]
    pub device: Device,
    /// Whether the store holds history for this device's serial
    pub has_history: bool,
    /// Technical error, when the device could not be probed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// User-facing explanation of `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// =============================================================================
// Time Range
// =============================================================================

/// Inclusive, optionally open-ended time window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Build a range, rejecting `from > to`
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(Error::InvalidTimeRange {
                    from: f.to_rfc3339(),
                    to: t.to_rfc3339(),
                });
            }
        }
        Ok(Self { from, to })
    }

    /// Range with no bounds
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Everything at or after `from`
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn from(&self) -> Option<DateTime<Utc>> {
        self.from
    }

    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    /// Whether `ts` lies inside the range (both ends inclusive)
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |f| *ts >= f) && self.to.map_or(true, |t| *ts <= t)
    }
}

/// The instant `days` before now, saturating at the earliest representable
/// time when the age is out of range
pub fn days_before_now(days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// =============================================================================
// Process Runner Port
// =============================================================================

/// Captured result of an external command
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Port for executing external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// A non-zero exit is not an error; only a failure to spawn is.
    async fn run(&self, program: &str, args: &[&str]) -> Result<ProcessOutput>;
}

// =============================================================================
// Disk Metadata Port
// =============================================================================

/// Port for best-effort descriptive metadata about a device
#[async_trait]
pub trait DiskMetadataProvider: Send + Sync {
    /// Capacity and enclosure flag; failures yield the zero value
    async fn describe(&self, device: &str) -> DiskMetadata;
}

// =============================================================================
// Telemetry Store Port
// =============================================================================

/// Port for the per-serial history log
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Append one record to the log of `serial`
    async fn append(&self, serial: &str, record: &HistoryRecord) -> Result<()>;

    /// Records of `serial` inside `range`, in insertion order
    async fn read_range(&self, serial: &str, range: &TimeRange) -> Result<Vec<HistoryRecord>>;

    /// Every serial with an existing log
    async fn list_serials(&self) -> Result<Vec<String>>;

    /// Drop records older than `max_age_days` from every log
    async fn compact(&self, max_age_days: u32) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ProcessRunnerRef = Arc<dyn ProcessRunner>;
pub type DiskMetadataProviderRef = Arc<dyn DiskMetadataProvider>;
pub type TelemetryStoreRef = Arc<dyn TelemetryStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    #[test]
    fn test_days_before_now_saturates() {
        let week = days_before_now(7);
        let expected = Utc::now() - Duration::days(7);
        assert!((expected - week).num_seconds().abs() < 5);

        assert_eq!(days_before_now(u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_drive_type_display() {
        assert_eq!(format!("{}", DriveType::Nvme), "NVMe");
        assert_eq!(format!("{}", DriveType::Ssd), "SSD");
        assert_eq!(format!("{}", DriveType::Hdd), "HDD");
        assert_eq!(
            serde_json::to_string(&DriveType::Nvme).unwrap(),
            "\"NVMe\""
        );
    }

    #[test]
    fn test_history_key_falls_back_to_unknown() {
        let mut device = Device::new("/dev/sda");
        assert_eq!(device.history_key(), UNKNOWN_SERIAL);

        device.serial = "  WD-123 ".into();
        assert_eq!(device.history_key(), "WD-123");
    }

    #[test]
    fn test_time_range_validation() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        assert!(TimeRange::new(Some(early), Some(late)).is_ok());
        assert!(TimeRange::new(Some(early), Some(early)).is_ok());
        assert_matches!(
            TimeRange::new(Some(late), Some(early)),
            Err(Error::InvalidTimeRange { .. })
        );
    }

    #[test]
    fn test_time_range_contains_is_inclusive() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let range = TimeRange::new(Some(early), Some(late)).unwrap();

        assert!(range.contains(&early));
        assert!(range.contains(&late));
        assert!(!range.contains(&(late + chrono::Duration::seconds(1))));
        assert!(TimeRange::unbounded().contains(&early));
    }
}

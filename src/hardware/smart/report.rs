//! smartctl JSON report schema
//!
//! `smartctl --all -j` emits different shapes depending on the transport.
//! ATA/SATA devices carry an attribute table, NVMe devices carry a vendor
//! health log. Both are decoded into their own variant of [`SmartReport`],
//! selected by the `device.protocol` discriminator.

use serde::Deserialize;
use thiserror::Error;

/// Message text smartctl uses when a USB bridge chip is not recognised
pub const UNKNOWN_BRIDGE_PATTERN: &str = "Unknown USB bridge";

// =============================================================================
// Report Errors
// =============================================================================

/// Why a tool output could not be turned into a report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("unrecognised USB bridge chip")]
    UnsupportedBridge,

    #[error("{0}")]
    Malformed(String),
}

// =============================================================================
// Shared Sections
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolSection {
    #[serde(default)]
    pub messages: Vec<ToolMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolMessage {
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub severity: String,
}

impl ToolMessage {
    fn is_error(&self) -> bool {
        self.severity == "error"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceSection {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub protocol: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusSection {
    #[serde(default)]
    pub passed: bool,
}

/// Fields every report variant carries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportIdentity {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub smart_status: Option<StatusSection>,
}

/// Only the parts needed to classify a report before decoding it
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    smartctl: ToolSection,
    #[serde(default)]
    device: DeviceSection,
}

impl Envelope {
    fn has_bridge_error(&self) -> bool {
        self.smartctl
            .messages
            .iter()
            .any(|m| m.is_error() && m.string.contains(UNKNOWN_BRIDGE_PATTERN))
    }

    fn first_error(&self) -> Option<&str> {
        self.smartctl
            .messages
            .iter()
            .find(|m| m.is_error())
            .map(|m| m.string.as_str())
    }

    fn is_nvme(&self) -> bool {
        self.device.protocol.contains("NVMe")
    }
}

// =============================================================================
// ATA Report
// =============================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TrimSection {
    #[serde(default)]
    pub supported: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TemperatureSection {
    #[serde(default)]
    pub current: i32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PowerOnTime {
    #[serde(default)]
    pub hours: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeTable {
    #[serde(default)]
    pub table: Vec<AtaAttributeEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtaAttributeEntry {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub worst: i64,
    #[serde(default)]
    pub thresh: i64,
    #[serde(default)]
    pub when_failed: String,
    #[serde(default)]
    pub raw: RawAttributeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAttributeValue {
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub string: String,
}

/// Report of an ATA/SATA device
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtaReport {
    #[serde(flatten)]
    pub identity: ReportIdentity,
    /// 0 for solid state, RPM for rotating media, absent when unreported
    #[serde(default)]
    pub rotation_rate: Option<i64>,
    #[serde(default)]
    pub trim: Option<TrimSection>,
    #[serde(default)]
    pub temperature: Option<TemperatureSection>,
    #[serde(default)]
    pub power_on_time: Option<PowerOnTime>,
    #[serde(default)]
    pub power_cycle_count: Option<u64>,
    #[serde(default)]
    pub ata_smart_attributes: Option<AttributeTable>,
}

impl AtaReport {
    fn carries_telemetry(&self) -> bool {
        self.identity.smart_status.is_some()
            || self.ata_smart_attributes.is_some()
            || self.temperature.is_some()
            || self.power_on_time.is_some()
    }
}

// =============================================================================
// NVMe Report
// =============================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NvmeHealthLog {
    #[serde(default)]
    pub temperature: i32,
    #[serde(default)]
    pub power_on_hours: u64,
    #[serde(default)]
    pub power_cycles: u64,
    #[serde(default)]
    pub unsafe_shutdowns: u64,
    #[serde(default)]
    pub media_errors: u64,
    #[serde(default)]
    pub percentage_used: u32,
}

/// Report of an NVMe device
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NvmeReport {
    #[serde(flatten)]
    pub identity: ReportIdentity,
    #[serde(default)]
    pub nvme_smart_health_information_log: Option<NvmeHealthLog>,
}

// =============================================================================
// Report
// =============================================================================

/// A decoded smartctl report
#[derive(Debug, Clone)]
pub enum SmartReport {
    Ata(AtaReport),
    Nvme(NvmeReport),
}

impl SmartReport {
    /// Decode raw tool output.
    ///
    /// Output is accepted regardless of the tool's exit status; a bridge
    /// error in the diagnostics rejects the whole report.
    pub fn parse(output: &[u8]) -> Result<Self, ReportError> {
        if output.iter().all(u8::is_ascii_whitespace) {
            return Err(ReportError::Malformed("no output".into()));
        }

        let value: serde_json::Value = serde_json::from_slice(output)
            .map_err(|e| ReportError::Malformed(format!("invalid JSON: {}", e)))?;

        let envelope = Envelope::deserialize(&value)
            .map_err(|e| ReportError::Malformed(format!("unexpected layout: {}", e)))?;

        if envelope.has_bridge_error() {
            return Err(ReportError::UnsupportedBridge);
        }

        let no_data = || {
            ReportError::Malformed(
                envelope
                    .first_error()
                    .map(str::to_string)
                    .unwrap_or_else(|| "report carries no SMART data".to_string()),
            )
        };

        if envelope.is_nvme() {
            let report = NvmeReport::deserialize(&value)
                .map_err(|e| ReportError::Malformed(format!("invalid NVMe report: {}", e)))?;
            if report.nvme_smart_health_information_log.is_none() {
                return Err(no_data());
            }
            Ok(SmartReport::Nvme(report))
        } else {
            let report = AtaReport::deserialize(&value)
                .map_err(|e| ReportError::Malformed(format!("invalid ATA report: {}", e)))?;
            if !report.carries_telemetry() {
                return Err(no_data());
            }
            Ok(SmartReport::Ata(report))
        }
    }

    pub fn identity(&self) -> &ReportIdentity {
        match self {
            SmartReport::Ata(r) => &r.identity,
            SmartReport::Nvme(r) => &r.identity,
        }
    }
}

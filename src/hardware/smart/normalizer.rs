//! Attribute Normalization
//!
//! Converts a transport-specific [`SmartReport`] into the uniform
//! [`TelemetrySnapshot`] and scores it.

use crate::domain::ports::{Device, DriveType, SmartAttribute, SmartStatus, TelemetrySnapshot};
use crate::hardware::smart::health::{health_percent, HealthBasis, HealthCounters};
use crate::hardware::smart::report::{AtaReport, NvmeReport, ReportError, SmartReport};
use chrono::{DateTime, Utc};

/// Reallocated_Sector_Ct
const ATTR_REALLOCATED: u32 = 5;
/// Temperature_Celsius
const ATTR_TEMPERATURE: u32 = 194;
/// Reallocated_Event_Count
const ATTR_REALLOCATED_EVENTS: u32 = 196;
/// Current_Pending_Sector
const ATTR_PENDING: u32 = 197;
/// Offline_Uncorrectable
const ATTR_UNCORRECTABLE: u32 = 198;

const SSD_MODEL_KEYWORDS: [&str; 3] = ["ssd", "solid state", "nvme"];

/// Decode and normalize raw tool output in one step.
///
/// Bridge errors and unusable output are returned as errors; no partial
/// snapshot is ever produced from them.
pub fn normalize_output(
    device_path: &str,
    output: &[u8],
    captured_at: DateTime<Utc>,
) -> Result<TelemetrySnapshot, ReportError> {
    let report = SmartReport::parse(output)?;
    Ok(normalize(device_path, &report, captured_at))
}

/// Build a scored snapshot from a decoded report
pub fn normalize(
    device_path: &str,
    report: &SmartReport,
    captured_at: DateTime<Utc>,
) -> TelemetrySnapshot {
    let identity = report.identity();
    let smart_status = match identity.smart_status {
        Some(s) if s.passed => SmartStatus::Passed,
        Some(_) => SmartStatus::Failed,
        None => SmartStatus::Unknown,
    };

    let mut snapshot = TelemetrySnapshot {
        device: Device {
            name: device_path.to_string(),
            model: identity.model_name.trim().to_string(),
            serial: identity.serial_number.trim().to_string(),
            device_type: DriveType::Unknown,
            capacity_gb: 0,
            is_external: false,
        },
        temperature: 0,
        power_on_hours: 0,
        power_cycle_count: 0,
        reallocated_sectors: 0,
        pending_sectors: 0,
        uncorrectable_errors: 0,
        health_percent: 0,
        smart_status,
        attributes: Vec::new(),
        timestamp: captured_at,
    };

    match report {
        SmartReport::Ata(ata) => apply_ata(&mut snapshot, ata),
        SmartReport::Nvme(nvme) => apply_nvme(&mut snapshot, nvme),
    }

    snapshot
}

fn apply_ata(snapshot: &mut TelemetrySnapshot, report: &AtaReport) {
    snapshot.device.device_type = classify_ata_drive(report);
    snapshot.temperature = report.temperature.map(|t| t.current).unwrap_or(0);
    snapshot.power_on_hours = report.power_on_time.map(|p| p.hours).unwrap_or(0);
    snapshot.power_cycle_count = report.power_cycle_count.unwrap_or(0);

    let table = report
        .ata_smart_attributes
        .as_ref()
        .map(|t| t.table.as_slice())
        .unwrap_or_default();

    let mut reallocated_events = 0;
    for entry in table {
        snapshot.attributes.push(SmartAttribute {
            id: entry.id,
            name: entry.name.clone(),
            value: entry.value,
            worst: entry.worst,
            threshold: entry.thresh,
            raw_value: entry.raw.value,
            when_failed: Some(entry.when_failed.clone()).filter(|w| !w.is_empty()),
        });

        let raw = entry.raw.value;
        match entry.id {
            ATTR_REALLOCATED => snapshot.reallocated_sectors = raw,
            ATTR_REALLOCATED_EVENTS => reallocated_events = raw,
            ATTR_PENDING => snapshot.pending_sectors = raw,
            ATTR_UNCORRECTABLE => snapshot.uncorrectable_errors = raw,
            ATTR_TEMPERATURE if snapshot.temperature == 0 => {
                // Raw value packs min/max in the upper bytes on many drives
                snapshot.temperature = (raw & 0xFF) as i32
            }
            _ => {}
        }
    }

    if snapshot.reallocated_sectors == 0 {
        snapshot.reallocated_sectors = reallocated_events;
    }

    snapshot.health_percent = health_percent(&HealthBasis::Counters(HealthCounters {
        reallocated_sectors: snapshot.reallocated_sectors,
        pending_sectors: snapshot.pending_sectors,
        uncorrectable_errors: snapshot.uncorrectable_errors,
        status: snapshot.smart_status,
    }));
}

fn apply_nvme(snapshot: &mut TelemetrySnapshot, report: &NvmeReport) {
    let log = report.nvme_smart_health_information_log.unwrap_or_default();

    snapshot.device.device_type = DriveType::Nvme;
    snapshot.temperature = log.temperature;
    snapshot.power_on_hours = log.power_on_hours;
    snapshot.power_cycle_count = log.power_cycles;
    snapshot.uncorrectable_errors = log.media_errors;
    snapshot.health_percent = health_percent(&HealthBasis::Wear {
        percentage_used: log.percentage_used,
    });
}

/// Classify an ATA drive as SSD or HDD.
///
/// Signals are consulted from most to least authoritative: rotation rate,
/// TRIM support, then model keywords.
pub fn classify_ata_drive(report: &AtaReport) -> DriveType {
    match report.rotation_rate {
        Some(0) => return DriveType::Ssd,
        Some(rpm) if rpm > 0 => return DriveType::Hdd,
        _ => {}
    }

    if report.trim.map(|t| t.supported).unwrap_or(false) {
        return DriveType::Ssd;
    }

    let model = report.identity.model_name.to_lowercase();
    if SSD_MODEL_KEYWORDS.iter().any(|kw| model.contains(kw)) {
        return DriveType::Ssd;
    }

    DriveType::Hdd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::smart::report::{ReportIdentity, TrimSection};
    use crate::testing::fixtures;
    use assert_matches::assert_matches;

    fn ata(rotation_rate: Option<i64>, trim: Option<bool>, model: &str) -> AtaReport {
        AtaReport {
            identity: ReportIdentity {
                model_name: model.to_string(),
                ..Default::default()
            },
            rotation_rate,
            trim: trim.map(|supported| TrimSection { supported }),
            ..Default::default()
        }
    }

    #[test]
    fn test_ata_snapshot() {
        let now = Utc::now();
        let snapshot = normalize_output("/dev/sda", fixtures::ATA_HDD.as_bytes(), now).unwrap();

        assert_eq!(snapshot.device.name, "/dev/sda");
        assert_eq!(snapshot.device.serial, "WD-WCC4E1234567");
        assert_eq!(snapshot.device.device_type, DriveType::Hdd);
        assert_eq!(snapshot.temperature, 34);
        assert_eq!(snapshot.power_on_hours, 21_345);
        assert_eq!(snapshot.power_cycle_count, 812);
        assert_eq!(snapshot.reallocated_sectors, 3);
        assert_eq!(snapshot.pending_sectors, 2);
        assert_eq!(snapshot.uncorrectable_errors, 1);
        assert_eq!(snapshot.health_percent, 83);
        assert_eq!(snapshot.smart_status, SmartStatus::Passed);
        assert_eq!(snapshot.attributes.len(), 6);
        assert_eq!(snapshot.timestamp, now);
    }

    #[test]
    fn test_ata_fallback_attributes() {
        let snapshot =
            normalize_output("/dev/sdb", fixtures::ATA_SSD_FALLBACKS.as_bytes(), Utc::now())
                .unwrap();

        // id 5 is zero so id 196 supplies the count
        assert_eq!(snapshot.reallocated_sectors, 4);
        // no direct temperature, id 194 low byte
        assert_eq!(snapshot.temperature, 41);
        assert_eq!(snapshot.device.device_type, DriveType::Ssd);
        assert_eq!(snapshot.smart_status, SmartStatus::Failed);
        assert_eq!(snapshot.health_percent, 100 - 8 - 50);
    }

    #[test]
    fn test_nvme_snapshot() {
        let snapshot = normalize_output("/dev/nvme0n1", fixtures::NVME.as_bytes(), Utc::now())
            .unwrap();

        assert_eq!(snapshot.device.device_type, DriveType::Nvme);
        assert_eq!(snapshot.device.model, "Samsung SSD 970 EVO Plus 1TB");
        assert_eq!(snapshot.temperature, 38);
        assert_eq!(snapshot.power_on_hours, 4_210);
        assert_eq!(snapshot.power_cycle_count, 1_034);
        assert_eq!(snapshot.uncorrectable_errors, 0);
        assert_eq!(snapshot.health_percent, 97);
        assert!(snapshot.attributes.is_empty());
    }

    #[test]
    fn test_bridge_error_aborts_normalization() {
        assert_matches!(
            normalize_output("/dev/sdb", fixtures::UNKNOWN_BRIDGE.as_bytes(), Utc::now()),
            Err(ReportError::UnsupportedBridge)
        );
    }

    #[test]
    fn test_classification_precedence() {
        // Rotation rate wins over the model keyword
        assert_eq!(classify_ata_drive(&ata(Some(0), Some(false), "Acme HDD-9000")), DriveType::Ssd);
        assert_eq!(classify_ata_drive(&ata(Some(7200), Some(true), "Acme SSD")), DriveType::Hdd);
        assert_eq!(classify_ata_drive(&ata(None, Some(true), "Acme HDD-9000")), DriveType::Ssd);
        assert_eq!(classify_ata_drive(&ata(None, None, "Acme Solid State Drive")), DriveType::Ssd);
        assert_eq!(classify_ata_drive(&ata(None, Some(false), "Acme NVMe bridge")), DriveType::Ssd);
        assert_eq!(classify_ata_drive(&ata(None, None, "Acme Disk")), DriveType::Hdd);
    }
}

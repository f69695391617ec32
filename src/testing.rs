//! Shared test doubles and smartctl output fixtures

use crate::domain::ports::{DiskMetadata, DiskMetadataProvider, ProcessOutput, ProcessRunner};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process runner answering from a table of full command lines.
///
/// Unknown command lines exit with status 2 and no output, like smartctl
/// does when it cannot open a device.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, ProcessOutput>>,
    calls: Mutex<Vec<String>>,
    tool_missing: bool,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner whose every spawn fails as if the binary did not exist
    pub fn missing_tool() -> Self {
        Self {
            tool_missing: true,
            ..Self::default()
        }
    }

    pub fn respond(self, command: &str, stdout: &str, exit_code: i32) -> Self {
        self.responses.lock().insert(
            command.to_string(),
            ProcessOutput {
                exit_code: Some(exit_code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<ProcessOutput> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().push(line.clone());

        if self.tool_missing {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: not found", program),
            )));
        }

        Ok(self
            .responses
            .lock()
            .get(&line)
            .cloned()
            .unwrap_or(ProcessOutput {
                exit_code: Some(2),
                ..Default::default()
            }))
    }
}

/// Metadata provider returning the same answer for every device
pub struct StaticMetadata(pub DiskMetadata);

#[async_trait]
impl DiskMetadataProvider for StaticMetadata {
    async fn describe(&self, _device: &str) -> DiskMetadata {
        self.0
    }
}

pub mod fixtures {
    pub const ATA_HDD: &str = r#"{
        "json_format_version": [1, 0],
        "smartctl": {"version": [7, 3], "exit_status": 0},
        "device": {"name": "/dev/sda", "info_name": "/dev/sda [SAT]", "type": "sat", "protocol": "ATA"},
        "model_name": "WDC WD10EZRX-00A8LB0",
        "serial_number": "WD-WCC4E1234567",
        "rotation_rate": 5400,
        "smart_status": {"passed": true},
        "temperature": {"current": 34},
        "power_on_time": {"hours": 21345},
        "power_cycle_count": 812,
        "ata_smart_attributes": {
            "revision": 16,
            "table": [
                {"id": 5, "name": "Reallocated_Sector_Ct", "value": 200, "worst": 200, "thresh": 140, "when_failed": "", "raw": {"value": 3, "string": "3"}},
                {"id": 9, "name": "Power_On_Hours", "value": 71, "worst": 71, "thresh": 0, "when_failed": "", "raw": {"value": 21345, "string": "21345"}},
                {"id": 194, "name": "Temperature_Celsius", "value": 113, "worst": 100, "thresh": 0, "when_failed": "", "raw": {"value": 34, "string": "34"}},
                {"id": 196, "name": "Reallocated_Event_Count", "value": 200, "worst": 200, "thresh": 0, "when_failed": "", "raw": {"value": 9, "string": "9"}},
                {"id": 197, "name": "Current_Pending_Sector", "value": 200, "worst": 200, "thresh": 0, "when_failed": "", "raw": {"value": 2, "string": "2"}},
                {"id": 198, "name": "Offline_Uncorrectable", "value": 200, "worst": 200, "thresh": 0, "when_failed": "", "raw": {"value": 1, "string": "1"}}
            ]
        }
    }"#;

    pub const ATA_SSD_FALLBACKS: &str = r#"{
        "smartctl": {"exit_status": 8},
        "device": {"name": "/dev/sdb", "type": "sat", "protocol": "ATA"},
        "model_name": "Crucial CT500MX500SSD1",
        "serial_number": "1904E1E5A0B1",
        "rotation_rate": 0,
        "trim": {"supported": true},
        "smart_status": {"passed": false},
        "power_on_time": {"hours": 9120},
        "power_cycle_count": 301,
        "ata_smart_attributes": {
            "table": [
                {"id": 5, "name": "Reallocate_NAND_Blk_Cnt", "value": 100, "worst": 100, "thresh": 10, "raw": {"value": 0, "string": "0"}},
                {"id": 194, "name": "Temperature_Celsius", "value": 59, "worst": 40, "thresh": 0, "raw": {"value": 214749675561, "string": "41 (Min/Max 20/50)"}},
                {"id": 196, "name": "Reallocated_Event_Count", "value": 100, "worst": 100, "thresh": 0, "raw": {"value": 4, "string": "4"}}
            ]
        }
    }"#;

    pub const NVME: &str = r#"{
        "smartctl": {"exit_status": 0},
        "device": {"name": "/dev/nvme0n1", "type": "nvme", "protocol": "NVMe"},
        "model_name": "Samsung SSD 970 EVO Plus 1TB",
        "serial_number": "S4EWNX0N123456A",
        "smart_status": {"passed": true},
        "nvme_smart_health_information_log": {
            "critical_warning": 0,
            "temperature": 38,
            "available_spare": 100,
            "percentage_used": 3,
            "power_cycles": 1034,
            "power_on_hours": 4210,
            "unsafe_shutdowns": 57,
            "media_errors": 0
        }
    }"#;

    pub const UNKNOWN_BRIDGE: &str = r#"{
        "smartctl": {
            "exit_status": 1,
            "messages": [{"string": "/dev/sdb: Unknown USB bridge [0x152d:0x0578 (0x214)]", "severity": "error"}]
        },
        "device": {"name": "/dev/sdb", "type": "scsi", "protocol": "SCSI"}
    }"#;

    pub const SCAN: &str = r#"{
        "devices": [
            {"name": "/dev/sda", "info_name": "/dev/sda [SAT]", "type": "sat", "protocol": "ATA"},
            {"name": "/dev/nvme0", "info_name": "/dev/nvme0", "type": "nvme", "protocol": "NVMe"},
            {"name": "/dev/sr0", "info_name": "/dev/sr0", "type": "scsi", "protocol": "SCSI"}
        ]
    }"#;
}

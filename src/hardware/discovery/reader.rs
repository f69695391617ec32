//! Telemetry Reader
//!
//! Reads one device end to end: probe, normalize, score, then attach the
//! host's capacity and enclosure metadata.

use crate::domain::ports::{DiskMetadataProviderRef, TelemetrySnapshot};
use crate::error::{Error, Result};
use crate::hardware::discovery::prober::TransportProber;
use crate::hardware::smart::normalize;
use chrono::Utc;
use tracing::debug;

/// Produces scored snapshots for individual devices
#[derive(Clone)]
pub struct TelemetryReader {
    prober: TransportProber,
    metadata: DiskMetadataProviderRef,
}

impl TelemetryReader {
    pub fn new(prober: TransportProber, metadata: DiskMetadataProviderRef) -> Self {
        Self { prober, metadata }
    }

    pub fn prober(&self) -> &TransportProber {
        &self.prober
    }

    /// Read a fresh snapshot of `device`
    pub async fn read(&self, device: &str) -> Result<TelemetrySnapshot> {
        if device.trim().is_empty() {
            return Err(Error::ProbeFailed {
                device: device.to_string(),
                reason: "empty device name".to_string(),
            });
        }

        let success = self.prober.probe(device).await?;
        // Acquisition time is when the data arrived, not when probing began
        let captured_at = Utc::now();

        let mut snapshot = normalize(device, &success.report, captured_at);
        let metadata = self.metadata.describe(device).await;
        snapshot.device.capacity_gb = metadata.capacity_gb;
        snapshot.device.is_external = metadata.is_external;

        debug!(
            device,
            serial = %snapshot.device.serial,
            hint = success.hint.unwrap_or("auto"),
            health = snapshot.health_percent,
            "Read telemetry"
        );
        Ok(snapshot)
    }
}

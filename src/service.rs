//! Health Monitor Service
//!
//! Composes the scanner, reader, store and collector into the call surface
//! used by the HTTP layer and the binary. Constructed once at startup and
//! shared by handle.

use crate::config::MonitorConfig;
use crate::domain::ports::{
    days_before_now, Device, DeviceInfo, DiskMetadataProviderRef, DriveType, HistoryRecord, ProcessRunnerRef,
    TelemetrySnapshot, TelemetryStore, TelemetryStoreRef, TimeRange, UNKNOWN_SERIAL,
};
use crate::error::Result;
use crate::hardware::discovery::{
    DeviceScanner, ScannerConfig, SystemDiskMetadata, SystemProcessRunner, TelemetryReader,
    TransportProber,
};
use crate::telemetry::{Collector, CollectorMetrics, CsvTelemetryStore};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Model shown for devices whose SMART data could not be read
pub const UNREADABLE_MODEL: &str = "unreadable";

/// The composed telemetry service
pub struct HealthMonitor {
    config: MonitorConfig,
    scanner: Arc<DeviceScanner>,
    reader: TelemetryReader,
    store: TelemetryStoreRef,
    collector: Arc<Collector>,
    metrics: CollectorMetrics,
}

impl HealthMonitor {
    /// Build the service on top of the host system
    pub async fn new(config: MonitorConfig) -> Result<Self> {
        let runner: ProcessRunnerRef = Arc::new(SystemProcessRunner::new());
        let metadata: DiskMetadataProviderRef = Arc::new(SystemDiskMetadata::new(runner.clone()));
        let store = Arc::new(CsvTelemetryStore::open(&config.collector.data_dir).await?);

        Self::from_parts(config, runner, metadata, store, ScannerConfig::default())
    }

    /// Build the service from explicit adapters
    pub fn from_parts(
        mut config: MonitorConfig,
        runner: ProcessRunnerRef,
        metadata: DiskMetadataProviderRef,
        store: TelemetryStoreRef,
        scanner_config: ScannerConfig,
    ) -> Result<Self> {
        config.validate();

        let prober = TransportProber::new(runner, config.smartctl_path.clone());
        let scanner = Arc::new(DeviceScanner::new(
            scanner_config,
            prober.clone(),
            metadata.clone(),
        ));
        let reader = TelemetryReader::new(prober, metadata);
        let metrics = CollectorMetrics::new()?;

        let collector = Arc::new(Collector::new(
            &config.collector,
            scanner.clone(),
            reader.clone(),
            store.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            scanner,
            reader,
            store,
            collector,
            metrics,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    pub fn metrics(&self) -> &CollectorMetrics {
        &self.metrics
    }

    /// Fail with `ToolNotInstalled` when smartctl cannot be run
    pub async fn check_dependencies(&self) -> Result<()> {
        self.reader.prober().check_installed().await?;
        info!(tool = %self.reader.prober().tool(), "smartctl available");
        Ok(())
    }

    /// Candidate devices, without probing them
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.scanner.discover().await
    }

    /// Every candidate device, probed, with its history status.
    ///
    /// Unreadable devices are listed with an explanation rather than dropped.
    pub async fn device_inventory(&self) -> Result<Vec<DeviceInfo>> {
        let devices = self.scanner.discover().await?;
        let known: HashSet<String> = self.store.list_serials().await?.into_iter().collect();

        let reads = join_all(devices.iter().map(|d| self.reader.read(&d.name))).await;

        Ok(devices
            .into_iter()
            .zip(reads)
            .map(|(device, read)| match read {
                Ok(snapshot) => DeviceInfo {
                    has_history: known.contains(snapshot.device.history_key()),
                    device: snapshot.device,
                    error: None,
                    error_message: None,
                },
                Err(e) => {
                    debug!(device = %device.name, "Device unreadable: {}", e);
                    DeviceInfo {
                        device: Device {
                            model: UNREADABLE_MODEL.to_string(),
                            serial: UNKNOWN_SERIAL.to_string(),
                            device_type: DriveType::Unknown,
                            ..device
                        },
                        has_history: false,
                        error: Some(e.to_string()),
                        error_message: Some(e.user_message()),
                    }
                }
            })
            .collect())
    }

    /// Read a device now, bypassing the collector
    pub async fn get_live_telemetry(&self, device: &str) -> Result<TelemetrySnapshot> {
        self.reader.read(device).await
    }

    /// History of `serial`; without a lower bound the last
    /// `history_default_days` are returned
    pub async fn get_history(
        &self,
        serial: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<HistoryRecord>> {
        // Caller bounds are validated before any default is applied
        TimeRange::new(from, to)?;

        let from = from.unwrap_or_else(|| days_before_now(self.config.history_default_days));
        if to.map_or(false, |to| from > to) {
            return Ok(Vec::new());
        }

        let range = TimeRange::new(Some(from), to)?;
        self.store.read_range(serial, &range).await
    }

    pub async fn list_known_serials(&self) -> Result<Vec<String>> {
        self.store.list_serials().await
    }

    pub async fn compact(&self, max_age_days: u32) -> Result<()> {
        self.store.compact(max_age_days).await
    }
}

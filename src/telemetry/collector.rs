//! Collector
//!
//! Background task that periodically enumerates devices, reads each one
//! and appends the result to the telemetry store. One unreadable device
//! never aborts a sweep.

use crate::config::CollectorConfig;
use crate::domain::ports::{TelemetryStore, TelemetryStoreRef};
use crate::error::ErrorKind;
use crate::hardware::discovery::{DeviceScanner, TelemetryReader};
use crate::telemetry::metrics::CollectorMetrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// =============================================================================
// Collector State
// =============================================================================

/// Lifecycle state of the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorState {
    Stopped,
    Running,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Devices the sweep tried to read
    pub attempted: usize,
    /// Devices whose snapshot was persisted
    pub collected: usize,
    /// Devices skipped because of an error
    pub failed: usize,
}

struct RunningTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

// =============================================================================
// Collector
// =============================================================================

/// Periodic telemetry collector
pub struct Collector {
    scanner: Arc<DeviceScanner>,
    reader: TelemetryReader,
    store: TelemetryStoreRef,
    metrics: CollectorMetrics,
    enabled: bool,
    interval: Duration,
    retention_days: Option<u32>,
    task: Mutex<Option<RunningTask>>,
}

impl Collector {
    pub fn new(
        config: &CollectorConfig,
        scanner: Arc<DeviceScanner>,
        reader: TelemetryReader,
        store: TelemetryStoreRef,
        metrics: CollectorMetrics,
    ) -> Self {
        Self {
            scanner,
            reader,
            store,
            metrics,
            enabled: config.enabled,
            interval: Duration::from_secs(config.interval_secs.max(1)),
            retention_days: config.retention_days.filter(|d| *d > 0),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CollectorState {
        match self.task.lock().as_ref() {
            Some(task) if !task.handle.is_finished() => CollectorState::Running,
            _ => CollectorState::Stopped,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the periodic loop; the first sweep runs immediately.
    ///
    /// A disabled collector stays stopped. Starting a running collector is a
    /// no-op.
    pub fn start(self: &Arc<Self>) -> CollectorState {
        if !self.enabled {
            info!("Collector disabled by configuration");
            return CollectorState::Stopped;
        }

        let mut task = self.task.lock();
        if task.as_ref().map(|t| !t.handle.is_finished()).unwrap_or(false) {
            debug!("Collector already running");
            return CollectorState::Running;
        }

        let token = CancellationToken::new();
        let this = Arc::clone(self);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move { this.run(loop_token).await });

        info!(interval_secs = self.interval.as_secs(), "Collector started");
        *task = Some(RunningTask { token, handle });
        CollectorState::Running
    }

    /// Stop the loop and wait for it to exit; a sweep in progress finishes
    /// first. Stopping a stopped collector does nothing.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().take() else {
            return;
        };

        task.token.cancel();
        if let Err(e) = task.handle.await {
            error!("Collector task ended abnormally: {}", e);
        }
        info!("Collector stopped");
    }

    async fn run(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Collect every discoverable device once, then apply retention
    pub async fn sweep(&self) -> SweepReport {
        let started = Instant::now();
        info!("Starting collection sweep");

        let devices = match self.scanner.discover().await {
            Ok(devices) => devices,
            Err(e) => {
                error!("Device discovery failed: {}", e);
                self.metrics.record_failure(e.kind());
                self.metrics.record_sweep(started.elapsed().as_secs_f64());
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            attempted: devices.len(),
            ..Default::default()
        };

        for device in &devices {
            match self.collect_one(&device.name).await {
                Ok(()) => report.collected += 1,
                Err(kind) => {
                    report.failed += 1;
                    self.metrics.record_failure(kind);
                }
            }
        }

        info!(
            "Collected {}/{} devices in {:.1}s",
            report.collected,
            report.attempted,
            started.elapsed().as_secs_f64()
        );

        if let Some(days) = self.retention_days {
            if let Err(e) = self.store.compact(days).await {
                warn!(retention_days = days, "Retention compaction failed: {}", e);
            }
        }

        self.metrics.record_sweep(started.elapsed().as_secs_f64());
        report
    }

    async fn collect_one(&self, device: &str) -> std::result::Result<(), ErrorKind> {
        let snapshot = self.reader.read(device).await.map_err(|e| {
            warn!(device, "Skipping device: {}", e);
            e.kind()
        })?;

        let serial = snapshot.device.history_key();
        self.store
            .append(serial, &snapshot.to_history_record())
            .await
            .map_err(|e| {
                warn!(device, serial, "Failed to persist snapshot: {}", e);
                e.kind()
            })?;

        debug!(device, serial, health = snapshot.health_percent, "Snapshot persisted");
        self.metrics.record_collected(serial, snapshot.health_percent);
        Ok(())
    }
}

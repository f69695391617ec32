//! Collector Metrics
//!
//! Prometheus instruments for collection sweeps, held in a registry owned by
//! the service rather than the process-global default.

use crate::error::{Error, ErrorKind, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "smart_telemetry";

/// Sweep and device health instruments
#[derive(Clone)]
pub struct CollectorMetrics {
    registry: Registry,
    sweeps_total: IntCounter,
    devices_collected_total: IntCounter,
    device_failures_total: IntCounterVec,
    sweep_duration_seconds: Histogram,
    device_health_percent: IntGaugeVec,
}

impl CollectorMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let sweeps_total = IntCounter::with_opts(
            Opts::new("sweeps_total", "Completed collection sweeps").namespace(NAMESPACE),
        )
        .map_err(metrics_err)?;
        let devices_collected_total = IntCounter::with_opts(
            Opts::new("devices_collected_total", "Device snapshots persisted").namespace(NAMESPACE),
        )
        .map_err(metrics_err)?;
        let device_failures_total = IntCounterVec::new(
            Opts::new("device_failures_total", "Per-device collection failures")
                .namespace(NAMESPACE),
            &["kind"],
        )
        .map_err(metrics_err)?;
        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("sweep_duration_seconds", "Duration of collection sweeps")
                .namespace(NAMESPACE)
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )
        .map_err(metrics_err)?;
        let device_health_percent = IntGaugeVec::new(
            Opts::new("device_health_percent", "Last observed health per serial")
                .namespace(NAMESPACE),
            &["serial"],
        )
        .map_err(metrics_err)?;

        registry.register(Box::new(sweeps_total.clone())).map_err(metrics_err)?;
        registry
            .register(Box::new(devices_collected_total.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(device_failures_total.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(sweep_duration_seconds.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(device_health_percent.clone()))
            .map_err(metrics_err)?;

        Ok(Self {
            registry,
            sweeps_total,
            devices_collected_total,
            device_failures_total,
            sweep_duration_seconds,
            device_health_percent,
        })
    }

    pub fn record_sweep(&self, duration_secs: f64) {
        self.sweeps_total.inc();
        self.sweep_duration_seconds.observe(duration_secs);
    }

    pub fn record_collected(&self, serial: &str, health_percent: u8) {
        self.devices_collected_total.inc();
        self.device_health_percent
            .with_label_values(&[serial])
            .set(i64::from(health_percent));
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        self.device_failures_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps_total.get()
    }

    pub fn collected(&self) -> u64 {
        self.devices_collected_total.get()
    }

    pub fn failures(&self, kind: ErrorKind) -> u64 {
        self.device_failures_total
            .with_label_values(&[kind.as_str()])
            .get()
    }

    /// Text exposition of every instrument
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_err)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("Metrics encoding: {}", e)))
    }
}

fn metrics_err(e: prometheus::Error) -> Error {
    Error::Internal(format!("Metrics error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_encodes() {
        let metrics = CollectorMetrics::new().unwrap();
        metrics.record_sweep(1.5);
        metrics.record_collected("WD-123", 83);
        metrics.record_failure(ErrorKind::UnsupportedBridge);
        metrics.record_failure(ErrorKind::UnsupportedBridge);

        assert_eq!(metrics.sweeps(), 1);
        assert_eq!(metrics.collected(), 1);
        assert_eq!(metrics.failures(ErrorKind::UnsupportedBridge), 2);
        assert_eq!(metrics.failures(ErrorKind::ProbeFailed), 0);

        let text = metrics.encode().unwrap();
        assert!(text.contains("smart_telemetry_sweeps_total 1"));
        assert!(text.contains("smart_telemetry_device_health_percent{serial=\"WD-123\"} 83"));
        assert!(text.contains("kind=\"unsupported_bridge\""));
    }

    #[test]
    fn test_instances_are_independent() {
        let a = CollectorMetrics::new().unwrap();
        let b = CollectorMetrics::new().unwrap();
        a.record_sweep(0.1);
        assert_eq!(b.sweeps(), 0);
    }
}

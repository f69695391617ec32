//! SMART Telemetry - Disk Health Monitoring Service
//!
//! Reads S.M.A.R.T. data from local drives through `smartctl`, normalizes
//! ATA and NVMe reports into one snapshot shape, derives a health
//! percentage and keeps a per-serial history on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       REST API (axum)                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │                  Health Monitor Service                      │
//! │   ┌───────────────┐   ┌──────────────┐   ┌───────────────┐   │
//! │   │    Scanner    │   │    Reader    │   │   Collector   │   │
//! │   └───────┬───────┘   └──────┬───────┘   └───────┬───────┘   │
//! │           └───────┬──────────┘                   │           │
//! │          ┌────────┴─────────┐           ┌────────┴────────┐  │
//! │          │ Transport Prober │           │ Telemetry Store │  │
//! │          │   (smartctl)     │           │ (CSV per serial)│  │
//! │          └──────────────────┘           └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST endpoints and server
//! - [`config`]: YAML configuration
//! - [`domain`]: Core domain types and ports
//! - [`error`]: Error types and handling
//! - [`hardware`]: Device discovery, probing and report normalization
//! - [`service`]: The composed service
//! - [`telemetry`]: History store, collector and metrics

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod service;
pub mod telemetry;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestRouter};

pub use config::{CollectorConfig, MonitorConfig, ServerConfig};

pub use domain::ports::{
    Device, DeviceInfo, DriveType, HistoryRecord, SmartAttribute, SmartStatus,
    TelemetrySnapshot, TelemetryStore, TimeRange,
};

pub use error::{Error, ErrorKind, Result};

pub use hardware::{
    health_percent, DeviceScanner, ScannerConfig, TelemetryReader, TransportProber,
};

pub use service::HealthMonitor;

pub use telemetry::{Collector, CollectorMetrics, CollectorState, CsvTelemetryStore, SweepReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

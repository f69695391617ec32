//! API Server
//!
//! Binds the REST router and serves it until shutdown is requested.

use crate::error::{Error, Result};
use crate::service::HealthMonitor;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use super::rest::RestRouter;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub addr: SocketAddr,
}

impl ApiServerConfig {
    /// Parse a `host:port` bind address
    pub fn from_addr(addr: &str) -> Result<Self> {
        let addr = addr
            .trim()
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid API address {:?}: {}", addr, e)))?;
        Ok(Self { addr })
    }
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 10044)),
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// HTTP server for the telemetry API
pub struct ApiServer {
    config: ApiServerConfig,
    monitor: Arc<HealthMonitor>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: Mutex<Option<broadcast::Receiver<()>>>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, monitor: Arc<HealthMonitor>) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            config,
            monitor,
            shutdown_tx,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.config.addr
    }

    /// Serve until [`ApiServer::shutdown`] is called
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self
            .shutdown_rx
            .lock()
            .take()
            .unwrap_or_else(|| self.shutdown_tx.subscribe());

        let app = RestRouter::new(self.monitor.clone()).build();

        let listener = tokio::net::TcpListener::bind(self.config.addr)
            .await
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to bind REST server on {}: {}",
                    self.config.addr, e
                ))
            })?;

        info!("REST API listening on {}", self.config.addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::domain::ports::DiskMetadata;
    use crate::hardware::discovery::ScannerConfig;
    use crate::telemetry::CsvTelemetryStore;
    use crate::testing::{ScriptedRunner, StaticMetadata};
    use assert_matches::assert_matches;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn monitor() -> (Arc<HealthMonitor>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CsvTelemetryStore::open(dir.path()).await.unwrap());
        let monitor = HealthMonitor::from_parts(
            MonitorConfig::default(),
            Arc::new(ScriptedRunner::new()),
            Arc::new(StaticMetadata(DiskMetadata::default())),
            store,
            ScannerConfig {
                sysfs_path: PathBuf::from("/nonexistent"),
                fallback_scan: false,
            },
        )
        .unwrap();
        (Arc::new(monitor), dir)
    }

    #[test]
    fn test_config_parsing() {
        assert_eq!(ApiServerConfig::default().addr.port(), 10044);
        assert_eq!(
            ApiServerConfig::from_addr("127.0.0.1:9000").unwrap().addr.port(),
            9000
        );
        assert_matches!(
            ApiServerConfig::from_addr("localhost"),
            Err(Error::Configuration(_))
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_run_is_not_lost() {
        let (monitor, _dir) = monitor().await;
        let server = ApiServer::new(ApiServerConfig::from_addr("127.0.0.1:0").unwrap(), monitor);

        server.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(5), server.run()).await;
        tokio_test::assert_ok!(tokio_test::assert_ok!(result));
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let (monitor, _dir) = monitor().await;
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ApiServerConfig {
            addr: occupied.local_addr().unwrap(),
        };

        let server = ApiServer::new(config, monitor);
        assert_matches!(server.run().await, Err(Error::Internal(_)));
    }
}

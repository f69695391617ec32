//! SMART Telemetry
//!
//! Disk health monitoring service: collects S.M.A.R.T. snapshots on a
//! schedule and serves live readings and history over HTTP.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smart_telemetry::{ApiServer, ApiServerConfig, HealthMonitor, MonitorConfig};

/// Upper bound on waiting for the server and collector to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// CLI Arguments
// =============================================================================

/// SMART Telemetry - disk health monitoring service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, short = 'c', env = "SMART_CONFIG")]
    config: Option<PathBuf>,

    /// REST API bind address
    #[arg(long, env = "SMART_ADDR")]
    addr: Option<String>,

    /// Directory for per-serial history files
    #[arg(long, env = "SMART_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Seconds between collection sweeps
    #[arg(long, env = "SMART_INTERVAL")]
    interval_secs: Option<u64>,

    /// Disable the background collector
    #[arg(long, env = "SMART_NO_COLLECTOR")]
    no_collector: bool,

    /// Drop history older than this many days after each sweep
    #[arg(long, env = "SMART_RETENTION_DAYS")]
    retention_days: Option<u32>,

    /// smartctl binary name or path
    #[arg(long, env = "SMARTCTL_PATH")]
    smartctl: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;

    info!("Starting SMART telemetry service");
    info!("  Version: {}", smart_telemetry::VERSION);
    info!("  REST API: {}", config.server.addr);
    info!("  Data dir: {}", config.collector.data_dir.display());
    info!(
        "  Collector: {} (every {}s)",
        if config.collector.enabled { "enabled" } else { "disabled" },
        config.collector.interval_secs
    );

    let monitor = Arc::new(
        HealthMonitor::new(config)
            .await
            .context("failed to initialize telemetry service")?,
    );

    if let Err(e) = monitor.check_dependencies().await {
        error!("{}", e.user_message());
        return Err(e).context("dependency check failed");
    }

    monitor.collector().start();

    let api_config = ApiServerConfig::from_addr(&monitor.config().server.addr)?;
    let server = Arc::new(ApiServer::new(api_config, monitor.clone()));

    let mut server_task = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    let early_exit = tokio::select! {
        _ = shutdown_signal() => None,
        joined = &mut server_task => Some(joined),
    };

    let joined = match early_exit {
        Some(joined) => {
            warn!("REST server exited before shutdown was requested");
            Ok(joined)
        }
        None => {
            info!("Shutdown signal received");
            server.shutdown();
            tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await
        }
    };

    let outcome = match joined {
        Ok(Ok(result)) => result.map_err(anyhow::Error::from),
        Ok(Err(e)) => Err(anyhow::anyhow!("REST server task failed: {}", e)),
        Err(_) => {
            warn!("REST server did not stop within {:?}", SHUTDOWN_TIMEOUT);
            Ok(())
        }
    };

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, monitor.collector().stop())
        .await
        .is_err()
    {
        warn!("Collector did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }

    info!("Shutdown complete");
    outcome
}

// =============================================================================
// Configuration
// =============================================================================

fn load_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MonitorConfig::default(),
    };

    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.collector.data_dir = dir.clone();
    }
    if let Some(secs) = args.interval_secs {
        config.collector.interval_secs = secs;
    }
    if args.no_collector {
        config.collector.enabled = false;
    }
    if let Some(days) = args.retention_days {
        config.collector.retention_days = Some(days).filter(|d| *d > 0);
    }
    if let Some(tool) = &args.smartctl {
        config.smartctl_path = tool.clone();
    }

    config.validate();
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,tower=warn,tower_http=info", level))
    });

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Signals
// =============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

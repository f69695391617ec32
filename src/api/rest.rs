//! REST API Handlers
//!
//! JSON endpoints for device inventory, live telemetry, history queries and
//! store maintenance, plus health and metrics.

use crate::error::{Error, ErrorKind};
use crate::service::HealthMonitor;
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters of the history endpoint (RFC3339 timestamps)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Compaction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactRequest {
    pub max_age_days: u32,
}

/// Compaction response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactResponse {
    pub compacted: bool,
    pub max_age_days: u32,
}

/// Health endpoint response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub collector: crate::telemetry::CollectorState,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorResponse {
    fn bad_request(error: &str, message: impl Into<String>) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse {
                error: error.into(),
                message: message.into(),
                details: None,
            }),
        )
            .into_response()
    }
}

/// Service error rendered as an HTTP response
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            error!(kind = %kind, "Request failed: {}", self.0);
        } else {
            debug!(kind = %kind, "Request rejected: {}", self.0);
        }

        (
            status,
            Json(ApiErrorResponse {
                error: kind.as_str().into(),
                message: self.0.user_message(),
                details: Some(self.0.to_string()),
            }),
        )
            .into_response()
    }
}

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidTimeRange => StatusCode::BAD_REQUEST,
        ErrorKind::UnsupportedBridge => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ProbeFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::ToolNotInstalled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::StoreUnavailable | ErrorKind::Configuration | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    monitor: Arc<HealthMonitor>,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self { monitor }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            monitor: self.monitor,
        };

        Router::new()
            // Device endpoints
            .route("/api/devices", get(list_devices))
            .route("/api/smart/*device", get(get_smart))
            // History endpoints
            .route("/api/history/:serial", get(get_history))
            .route("/api/serials", get(list_serials))
            .route("/api/compact", post(compact))
            // Health and metrics
            .route("/health", get(health_check))
            .route("/metrics", get(metrics))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    monitor: Arc<HealthMonitor>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Inventory of devices with readability and history status
async fn list_devices(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let devices = state.monitor.device_inventory().await?;
    Ok((StatusCode::OK, Json(devices)))
}

/// Live SMART snapshot of one device
async fn get_smart(
    State(state): State<AppState>,
    Path(device): Path<String>,
) -> Result<Response, ApiError> {
    let device = decode_device_path(&device);
    if device.is_empty() || device == "/" {
        return Ok(ApiErrorResponse::bad_request(
            "invalid_request",
            "device name required",
        ));
    }

    info!(device = %device, "Live telemetry requested");
    let snapshot = state.monitor.get_live_telemetry(&device).await?;
    Ok((StatusCode::OK, Json(snapshot)).into_response())
}

/// Stored history of one serial
async fn get_history(
    State(state): State<AppState>,
    Path(serial): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    if serial.trim().is_empty() {
        return Ok(ApiErrorResponse::bad_request(
            "invalid_request",
            "serial number required",
        ));
    }

    let from = match parse_bound(query.from.as_deref()) {
        Ok(from) => from,
        Err(()) => {
            return Ok(ApiErrorResponse::bad_request(
                ErrorKind::InvalidTimeRange.as_str(),
                "invalid from time format",
            ))
        }
    };
    let to = match parse_bound(query.to.as_deref()) {
        Ok(to) => to,
        Err(()) => {
            return Ok(ApiErrorResponse::bad_request(
                ErrorKind::InvalidTimeRange.as_str(),
                "invalid to time format",
            ))
        }
    };

    let records = state.monitor.get_history(&serial, from, to).await?;
    Ok((StatusCode::OK, Json(records)).into_response())
}

/// Serials with stored history
async fn list_serials(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let serials = state.monitor.list_known_serials().await?;
    Ok((StatusCode::OK, Json(serials)))
}

/// Drop history older than the requested age
async fn compact(
    State(state): State<AppState>,
    Json(request): Json<CompactRequest>,
) -> Result<Response, ApiError> {
    if request.max_age_days == 0 {
        return Ok(ApiErrorResponse::bad_request(
            "invalid_request",
            "max_age_days must be at least 1",
        ));
    }

    state.monitor.compact(request.max_age_days).await?;
    Ok((
        StatusCode::OK,
        Json(CompactResponse {
            compacted: true,
            max_age_days: request.max_age_days,
        }),
    )
        .into_response())
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: crate::VERSION,
            collector: state.monitor.collector().state(),
        }),
    )
}

/// Prometheus text exposition
async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.monitor.metrics().encode()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

// =============================================================================
// Helpers
// =============================================================================

/// Device path from the captured URL segment (`%2Fdev%2Fsda` or `dev/sda`)
pub fn decode_device_path(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let decoded = decoded.trim();

    if decoded.starts_with("dev/") {
        format!("/{}", decoded)
    } else {
        decoded.to_string()
    }
}

fn parse_bound(value: Option<&str>) -> std::result::Result<Option<DateTime<Utc>>, ()> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => DateTime::parse_from_rfc3339(v)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::domain::ports::{DiskMetadata, HistoryRecord, TelemetryStore};
    use crate::hardware::discovery::ScannerConfig;
    use crate::telemetry::CsvTelemetryStore;
    use crate::testing::{fixtures, ScriptedRunner, StaticMetadata};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<CsvTelemetryStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CsvTelemetryStore::open(dir.path()).await.unwrap());

        let mut bridged = ScriptedRunner::new()
            .respond("smartctl --scan-open -j", fixtures::SCAN, 0)
            .respond("smartctl --all -j /dev/sda", fixtures::ATA_HDD, 0);
        for hint in crate::hardware::discovery::BRIDGE_HINTS {
            let cmd = match hint {
                Some(h) => format!("smartctl --all -j -d {} /dev/sdb", h),
                None => "smartctl --all -j /dev/sdb".to_string(),
            };
            bridged = bridged.respond(&cmd, fixtures::UNKNOWN_BRIDGE, 1);
        }

        let monitor = HealthMonitor::from_parts(
            MonitorConfig::default(),
            Arc::new(bridged),
            Arc::new(StaticMetadata(DiskMetadata::default())),
            store.clone(),
            ScannerConfig {
                sysfs_path: PathBuf::from("/nonexistent"),
                fallback_scan: false,
            },
        )
        .unwrap();

        (RestRouter::new(Arc::new(monitor)).build(), store, dir)
    }

    async fn fetch(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    fn record(ts: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            timestamp: ts,
            temperature: 33,
            power_on_hours: 100,
            power_cycle_count: 5,
            reallocated_sectors: 0,
            pending_sectors: 0,
            uncorrectable_errors: 0,
            health_percent: 100,
        }
    }

    #[test]
    fn test_decode_device_path() {
        assert_eq!(decode_device_path("/dev/sda"), "/dev/sda");
        assert_eq!(decode_device_path("dev/sda"), "/dev/sda");
        assert_eq!(decode_device_path("%2Fdev%2Fnvme0n1"), "/dev/nvme0n1");
        assert_eq!(decode_device_path("disk2"), "disk2");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidTimeRange), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::UnsupportedBridge), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::ProbeFailed), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::StoreUnavailable), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_live_smart_endpoint() {
        let (app, _store, _dir) = app().await;

        let (status, body) = fetch(&app, "/api/smart/%2Fdev%2Fsda").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["health_percent"], 83);
        assert_eq!(body["device"]["device_type"], "HDD");

        let (status, _) = fetch(&app, "/api/smart/dev/sda").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bridge_error_is_distinguishable() {
        let (app, _store, _dir) = app().await;

        let (status, body) = fetch(&app, "/api/smart/dev/sdb").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "unsupported_bridge");

        let (status, body) = fetch(&app, "/api/smart/dev/sdc").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "probe_failed");
        assert_ne!(body["message"], "");
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let (app, store, _dir) = app().await;
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        store.append("WD-1", &record(ts)).await.unwrap();

        let (status, body) = fetch(&app, "/api/history/WD-1?from=2024-04-01T00:00:00Z").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["timestamp"], "2024-05-01T08:00:00Z");

        // Default window is the last week, which excludes the old record
        let (status, body) = fetch(&app, "/api/history/WD-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(0));

        let (status, body) = fetch(&app, "/api/history/WD-1?from=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_time_range");

        let (status, body) = fetch(
            &app,
            "/api/history/WD-1?from=2024-06-01T00:00:00Z&to=2024-05-01T00:00:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_time_range");
    }

    #[tokio::test]
    async fn test_devices_and_serials() {
        let (app, store, _dir) = app().await;
        store.append("WD-WCC4E1234567", &record(Utc::now())).await.unwrap();

        let (status, body) = fetch(&app, "/api/devices").await;
        assert_eq!(status, StatusCode::OK);
        let devices = body.as_array().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0]["has_history"], true);
        assert_eq!(devices[0]["device_type"], "HDD");
        assert_eq!(devices[1]["name"], "/dev/nvme0");
        assert_eq!(devices[1]["model"], "unreadable");
        assert!(devices[1]["error_message"].is_string());

        let (status, body) = fetch(&app, "/api/serials").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["WD-WCC4E1234567"]));
    }

    #[tokio::test]
    async fn test_compact_endpoint() {
        let (app, store, _dir) = app().await;
        store.append("S1", &record(Utc::now() - chrono::Duration::days(90))).await.unwrap();
        store.append("S1", &record(Utc::now())).await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/compact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"max_age_days": 30}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let remaining = store
            .read_range("S1", &crate::domain::ports::TimeRange::unbounded())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let (app, _store, _dir) = app().await;

        let (status, body) = fetch(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["collector"], "stopped");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("smart_telemetry_sweeps_total"));
    }
}

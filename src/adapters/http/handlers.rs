//! HTTP handlers for the ingress endpoints.
//!
//! These are thin adapters over [`RelayService`]: the scan path cannot fail
//! (decoding is infallible and broadcast absorbs per-session failures), so
//! every handler responds 200.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use bytes::Bytes;
use tracing::info;

use crate::application::RelayService;
use crate::domain::{epoch_millis, ScanPayload};

use super::dto::{HealthResponse, ScanResponse, TestScanRequest, TestScanResponse};

/// Shared state for every HTTP and WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    pub registry: Arc<crate::adapters::websocket::SessionRegistry>,
    pub started_at: Instant,
    /// SPA entry point, served for non-upgrade requests at the root.
    /// Only set in production.
    pub static_index: Option<std::path::PathBuf>,
}

impl AppState {
    pub fn new() -> Self {
        let registry = Arc::new(crate::adapters::websocket::SessionRegistry::new());
        Self {
            relay: Arc::new(RelayService::new(registry.clone())),
            registry,
            started_at: Instant::now(),
            static_index: None,
        }
    }

    pub fn with_static_index(mut self, index: Option<std::path::PathBuf>) -> Self {
        self.static_index = index;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a request body by content type for the decoder.
///
/// Scanners lie about content types often enough that a JSON body which
/// fails to parse is handed over as raw bytes instead of being rejected.
fn payload_from_request(headers: &HeaderMap, body: Bytes) -> ScanPayload {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        match serde_json::from_slice(&body) {
            Ok(value) => ScanPayload::Json(value),
            Err(_) => ScanPayload::Bytes(body),
        }
    } else if content_type.starts_with("text/")
        || content_type.starts_with("application/x-www-form-urlencoded")
    {
        ScanPayload::Text(String::from_utf8_lossy(&body).into_owned())
    } else {
        ScanPayload::Bytes(body)
    }
}

/// `POST /scan` - the hardware scanner's entry point.
pub async fn scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ScanResponse> {
    let payload = payload_from_request(&headers, body);
    let receipt = state.relay.ingest(payload).await;

    Json(ScanResponse {
        success: true,
        barcode: receipt.barcode,
        clients: receipt.clients,
    })
}

/// `POST /api/test-scan` - inject a synthetic scan through the same
/// decode + broadcast pipeline.
pub async fn test_scan(
    State(state): State<AppState>,
    req: Option<Json<TestScanRequest>>,
) -> Json<TestScanResponse> {
    let barcode = req
        .and_then(|Json(r)| r.barcode)
        .unwrap_or_else(|| format!("TEST{}", epoch_millis()));

    info!(barcode = %barcode, "test scan");
    let receipt = state.relay.ingest(ScanPayload::Text(barcode)).await;

    Json(TestScanResponse {
        success: true,
        barcode: receipt.barcode,
    })
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connected_clients: state.registry.len(),
        timestamp: epoch_millis(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

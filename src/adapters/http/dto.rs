//! Request/response bodies for the REST endpoints.

use serde::{Deserialize, Serialize};

/// Response for `POST /scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub success: bool,
    pub barcode: String,
    pub clients: usize,
}

/// Request body for `POST /api/test-scan`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestScanRequest {
    #[serde(default)]
    pub barcode: Option<String>,
}

/// Response for `POST /api/test-scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestScanResponse {
    pub success: bool,
    pub barcode: String,
}

/// Response for `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub connected_clients: usize,
    pub timestamp: i64,
    /// Seconds since process start.
    pub uptime: f64,
}

//! Router assembly for the relay.
//!
//! The push channel handshake lives at the server root; the same path
//! serves the viewer SPA to plain GET requests in production, matching how
//! the scanner deployment exposes a single port for everything.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::warn;

use crate::adapters::websocket;
use crate::config::ServerConfig;

use super::handlers::{self, AppState};

/// Build the full application router.
pub fn app_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/scan", post(handlers::scan))
        .route("/api/test-scan", post(handlers::test_scan))
        .route("/api/health", get(handlers::health));

    if config.is_production() {
        let dir = config.static_dir.clone();
        let index = dir.join("index.html");
        // SPA catch-all: unknown paths get index.html, assets get served.
        router = router.fallback_service(ServeDir::new(&dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
        .with_state(state)
}

/// Root endpoint: WebSocket handshake, or the SPA for plain requests.
async fn root(ws: Option<WebSocketUpgrade>, State(state): State<AppState>) -> Response {
    match ws {
        Some(upgrade) => websocket::ws_handler(upgrade, State(state)).await,
        None => match &state.static_index {
            Some(index) => match tokio::fs::read_to_string(index).await {
                Ok(contents) => Html(contents).into_response(),
                Err(e) => {
                    warn!(path = %index.display(), error = %e, "failed to read SPA index");
                    StatusCode::NOT_FOUND.into_response()
                }
            },
            None => StatusCode::NOT_FOUND.into_response(),
        },
    }
}

/// CORS for browser viewers.
///
/// Scanners send no Origin header and bypass CORS entirely. Development
/// restricts browsers to the configured origin list; production allows any
/// origin since the deployment sits on a single TLS host.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST];
    let headers = [header::CONTENT_TYPE];

    if config.is_production() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins_list()
        .into_iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
}

//! Process bootstrap: configuration, tracing, serve.

use std::error::Error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use scan_relay::adapters::http::{app_router, AppState};
use scan_relay::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let static_index = config
        .server
        .is_production()
        .then(|| config.server.static_dir.join("index.html"));
    let state = AppState::new().with_static_index(static_index);
    let registry = state.registry.clone();

    let router = app_router(state, &config.server);
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        %addr,
        environment = ?config.server.environment,
        "scan relay listening; configure the scanner to POST to /scan"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    info!("server closed");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, closing viewer sessions first so the
/// scanner fleet sees clean channel shutdowns instead of resets.
async fn shutdown_signal(registry: std::sync::Arc<scan_relay::adapters::websocket::SessionRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, closing viewer sessions");
    registry.close_all().await;
}

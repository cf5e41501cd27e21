/// # Server Module
///
/// HTTP surface over the batch pipeline and the live prediction stream.
///
pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::cryptocompare::CryptoCompareClient;
use crate::config::ForecastConfig;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
pub struct AppState {
    pub config: ForecastConfig,
    pub client: CryptoCompareClient,
}

impl AppState {
    pub fn new(config: ForecastConfig) -> Result<Arc<Self>> {
        let client = CryptoCompareClient::from_config(&config).context("Failed to build HTTP client")?;
        Ok(Arc::new(Self { config, client }))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until Ctrl+C
pub async fn serve(config: ForecastConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.bind, config.port))?;
    let app = router(AppState::new(config)?);

    log::info!("Forecast server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received, gracefully stopping");
}

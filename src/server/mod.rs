//! HTTP surface: one JSON endpoint serving a channel's recent videos.

mod error;
mod handlers;
mod state;

pub use error::{ApiError, ApiResult};
pub use handlers::{FeedQuery, DIAGNOSTIC_TAG};
pub use state::{AppState, Upstream};

use anyhow::Context;
use axum::{routing::get, Router};

use crate::config::Config;

pub const FEED_ROUTE: &str = "/api/yt-feed";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(FEED_ROUTE, get(handlers::yt_feed))
        .with_state(state)
}

/// Binds `config.bind` and serves until Ctrl-C.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr = config.bind;
    let state = AppState::new(config).context("Failed to build HTTP client")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(addr = %addr, route = FEED_ROUTE, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

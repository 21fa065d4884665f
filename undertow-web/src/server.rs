//! Router assembly and server lifecycle

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use undertow_core::TorrentRegistry;
use undertow_core::config::ServerConfig;

use crate::handlers::{
    add_torrent, delete_torrent, get_torrent, health, list_torrents, resolve_file, stream_by_hash,
    stream_by_link,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TorrentRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<TorrentRegistry>) -> Self {
        Self { registry }
    }
}

/// Failures that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/torrents", get(list_torrents).post(add_torrent))
        .route(
            "/api/torrents/{info_hash}",
            get(get_torrent).delete(delete_torrent),
        )
        .route("/api/torrents/{info_hash}/file", get(resolve_file))
        .route("/stream", get(stream_by_link))
        .route("/stream/{info_hash}", get(stream_by_hash))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until `shutdown` resolves.
///
/// # Errors
/// - `ServerError::Bind` - Address unavailable
/// - `ServerError::Serve` - Listener failed while serving
pub async fn run_server(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let address = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;

    info!(%address, "Undertow listening on http://{address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

pub mod error;
pub mod handlers;

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};
use crate::state::AppState;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Pages
        .route("/", get(handlers::home).post(handlers::upload))
        .route("/view", get(handlers::view_data))
        .route("/options_chain", get(handlers::options_chain))
        // JSON
        .route("/api/dates", get(handlers::api_dates))
        .route("/api/chain", get(handlers::api_chain))
        .route("/api/straddles", get(handlers::api_straddles))
        // Health
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(addr: &str, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Listening on http://{}", addr);
    info!("  Upload:        GET/POST http://{}/", addr);
    info!("  Options chain: GET      http://{}/options_chain", addr);
    info!("  Status:        GET      http://{}/status", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api;
use crate::config::Config;
use crate::db::Db;
use crate::error::Result;
use crate::state::AppState;

pub async fn run(config: Config) -> Result<()> {
    info!("📈 Started");
    info!("================================");

    info!("Database: {}", config.database.masked_url());
    info!(
        "Session window: {}–{} UTC, labels in {}",
        config.session.window.open.format("%H:%M"),
        config.session.window.close.format("%H:%M"),
        config.session.display_tz.name()
    );

    let db = Arc::new(Db::new(&config.database.url, config.database.max_connections).await?);

    let report = db.migrate().await?;
    info!(
        "Schema at version {} ({} applied, {} already present)",
        report.schema_version(),
        report.applied.len(),
        report.already_applied
    );
    for failure in &report.failures {
        warn!(
            "Optional migration {} ({}) not applied: {}",
            failure.version, failure.name, failure.reason
        );
    }

    let state = AppState::new(db.clone(), config.session.clone(), report);
    let app = api::router(state, config.server.max_upload_bytes);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutting down");
    };

    let served = api::serve(&config.server.addr(), app, shutdown).await;

    // Handlers hold clones until the server future is dropped.
    match Arc::try_unwrap(db) {
        Ok(db) => db.close().await?,
        Err(_) => warn!("Database still in use at shutdown, leaving pool to drop"),
    }

    served
}

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::db::{Db, MigrationReport};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub session: Arc<SessionConfig>,
    pub migrations: Arc<MigrationReport>,
}

impl AppState {
    pub fn new(db: Arc<Db>, session: SessionConfig, migrations: MigrationReport) -> Self {
        Self {
            db,
            session: Arc::new(session),
            migrations: Arc::new(migrations),
        }
    }
}

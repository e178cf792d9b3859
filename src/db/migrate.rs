//! Versioned schema migrations.
//!
//! Each migration is applied at most once and recorded in
//! `schema_migrations`. Table migrations are required and abort startup on
//! failure; index migrations are optional, reported, and retried on the next
//! start.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{ActiveValue, ConnectionTrait, DbBackend, EntityTrait, Statement};
use sea_query::{Alias, ColumnDef, Index, Table};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::constants::{INDEX_TABLE, MIGRATIONS_TABLE, OPTION_TABLE};
use crate::db::models::{index_data, option_data, schema_migrations};
use crate::db::Db;
use crate::error::{Error, Result};

pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub required: bool,
    build: fn(DbBackend) -> Statement,
}

pub const MIGRATIONS: [Migration; 6] = [
    Migration {
        version: 1,
        name: "create_index_data",
        required: true,
        build: create_index_table,
    },
    Migration {
        version: 2,
        name: "create_option_data",
        required: true,
        build: create_option_table,
    },
    Migration {
        version: 3,
        name: "idx_index_session_minute",
        required: false,
        build: index_session_minute,
    },
    Migration {
        version: 4,
        name: "idx_option_minute_expiry",
        required: false,
        build: option_minute_expiry,
    },
    Migration {
        version: 5,
        name: "idx_option_expiry_strike",
        required: false,
        build: option_expiry_strike,
    },
    Migration {
        version: 6,
        name: "idx_option_session_date",
        required: false,
        build: option_session_date,
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    pub version: i32,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub applied: Vec<i32>,
    pub already_applied: usize,
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn schema_version(&self) -> i32 {
        MIGRATIONS
            .iter()
            .map(|m| m.version)
            .filter(|v| !self.failures.iter().any(|f| f.version == *v))
            .max()
            .unwrap_or(0)
    }
}

impl Db {
    /// Bring the schema up to date.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let conn = self.connection();
        let backend = conn.get_database_backend();

        conn.execute(backend.build(&create_migrations_table()))
            .await
            .map_err(|e| Error::Migration {
                version: 0,
                name: MIGRATIONS_TABLE.to_string(),
                reason: e.to_string(),
            })?;

        let done: HashSet<i32> = schema_migrations::Entity::find()
            .all(conn)
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect();

        let mut report = MigrationReport::default();
        for migration in MIGRATIONS.iter() {
            if done.contains(&migration.version) {
                report.already_applied += 1;
                continue;
            }

            match self.apply(migration, backend).await {
                Ok(()) => {
                    info!(
                        "✅ Applied migration {} ({})",
                        migration.version, migration.name
                    );
                    report.applied.push(migration.version);
                }
                Err(reason) if migration.required => {
                    error!(
                        "Migration {} ({}) failed: {}",
                        migration.version, migration.name, reason
                    );
                    return Err(Error::Migration {
                        version: migration.version,
                        name: migration.name.to_string(),
                        reason,
                    });
                }
                Err(reason) => {
                    warn!(
                        "Optional migration {} ({}) failed, continuing: {}",
                        migration.version, migration.name, reason
                    );
                    report.failures.push(MigrationFailure {
                        version: migration.version,
                        name: migration.name.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn apply(&self, migration: &Migration, backend: DbBackend) -> std::result::Result<(), String> {
        let conn = self.connection();
        conn.execute((migration.build)(backend))
            .await
            .map_err(|e| e.to_string())?;

        let record = schema_migrations::ActiveModel {
            version: ActiveValue::Set(migration.version),
            name: ActiveValue::Set(migration.name.to_string()),
            applied_at: ActiveValue::Set(Utc::now().naive_utc()),
        };
        schema_migrations::Entity::insert(record)
            .exec(conn)
            .await
            .map_err(|e| format!("recording migration: {}", e))?;
        Ok(())
    }
}

fn create_migrations_table() -> sea_query::TableCreateStatement {
    Table::create()
        .table(Alias::new(MIGRATIONS_TABLE))
        .if_not_exists()
        .col(
            ColumnDef::new(schema_migrations::Column::Version)
                .integer()
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(schema_migrations::Column::Name)
                .string_len(100)
                .not_null(),
        )
        .col(
            ColumnDef::new(schema_migrations::Column::AppliedAt)
                .date_time()
                .not_null(),
        )
        .to_owned()
}

fn create_index_table(backend: DbBackend) -> Statement {
    use index_data::Column;

    let stmt = Table::create()
        .table(Alias::new(INDEX_TABLE))
        .if_not_exists()
        .col(
            ColumnDef::new(Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Column::SessionDate).date().not_null())
        .col(ColumnDef::new(Column::Minute).date_time().not_null())
        .col(ColumnDef::new(Column::Open).decimal_len(16, 4).not_null())
        .col(ColumnDef::new(Column::High).decimal_len(16, 4))
        .col(ColumnDef::new(Column::Low).decimal_len(16, 4))
        .col(ColumnDef::new(Column::Close).decimal_len(16, 4))
        .col(ColumnDef::new(Column::Volume).big_integer())
        .to_owned();
    backend.build(&stmt)
}

fn create_option_table(backend: DbBackend) -> Statement {
    use option_data::Column;

    let stmt = Table::create()
        .table(Alias::new(OPTION_TABLE))
        .if_not_exists()
        .col(
            ColumnDef::new(Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Column::SessionDate).date().not_null())
        .col(ColumnDef::new(Column::Minute).date_time().not_null())
        .col(ColumnDef::new(Column::Strike).decimal_len(12, 4).not_null())
        .col(ColumnDef::new(Column::OptionType).string_len(4).not_null())
        .col(ColumnDef::new(Column::ExpiryDate).date().not_null())
        .col(ColumnDef::new(Column::BidOpen).decimal_len(12, 4))
        .col(ColumnDef::new(Column::AskOpen).decimal_len(12, 4))
        .to_owned();
    backend.build(&stmt)
}

fn index_session_minute(backend: DbBackend) -> Statement {
    let stmt = Index::create()
        .name("idx_index_session_minute")
        .table(Alias::new(INDEX_TABLE))
        .col(index_data::Column::SessionDate)
        .col(index_data::Column::Minute)
        .to_owned();
    backend.build(&stmt)
}

fn option_minute_expiry(backend: DbBackend) -> Statement {
    let stmt = Index::create()
        .name("idx_option_minute_expiry")
        .table(Alias::new(OPTION_TABLE))
        .col(option_data::Column::Minute)
        .col(option_data::Column::ExpiryDate)
        .to_owned();
    backend.build(&stmt)
}

fn option_expiry_strike(backend: DbBackend) -> Statement {
    let stmt = Index::create()
        .name("idx_option_expiry_strike")
        .table(Alias::new(OPTION_TABLE))
        .col(option_data::Column::ExpiryDate)
        .col(option_data::Column::Strike)
        .to_owned();
    backend.build(&stmt)
}

fn option_session_date(backend: DbBackend) -> Statement {
    let stmt = Index::create()
        .name("idx_option_session_date")
        .table(Alias::new(OPTION_TABLE))
        .col(option_data::Column::SessionDate)
        .to_owned();
    backend.build(&stmt)
}

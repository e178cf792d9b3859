use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration {version} ({name}) failed: {reason}")]
    Migration {
        version: i32,
        name: String,
        reason: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("No index data found for {0}")]
    NoSessionData(NaiveDate),

    #[error("No index tick at {0}")]
    NoReferenceTick(NaiveDateTime),

    #[error("{0}")]
    Other(String),
}

impl From<sea_orm::DbErr> for Error {
    fn from(e: sea_orm::DbErr) -> Self {
        Error::Database(e.to_string())
    }
}

impl Error {
    /// Session-level failures that should render as an empty dashboard
    /// rather than a server error.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, Error::NoSessionData(_) | Error::NoReferenceTick(_))
    }
}

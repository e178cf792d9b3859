pub mod api;
pub mod app;
pub mod chain;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod market;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};

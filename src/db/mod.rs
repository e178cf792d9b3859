mod main;
pub mod migrate;
pub mod models;
pub mod store;

pub use main::{Db, TableCounts};
pub use migrate::{MigrationFailure, MigrationReport};
pub use store::{QuoteStore, TickStore};

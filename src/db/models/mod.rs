pub mod index_data;
pub mod option_data;
pub mod schema_migrations;

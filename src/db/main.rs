use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{
    ActiveValue, ConnectOptions, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait, ColumnTrait,
};
use tracing::{info, warn};

use crate::constants::INSERT_BATCH_SIZE;
use crate::db::models::{index_data, option_data};
use crate::db::store::{QuoteStore, TickStore};
use crate::error::{Error, Result};
use crate::ingest::IndexRecord;
use crate::market::{IndexTick, OptionQuote};

/// Store handle. Opened once at startup, shared through the server state and
/// closed on shutdown.
pub struct Db {
    connection: DatabaseConnection,
}

/// Row counts for the status page.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TableCounts {
    pub index_rows: u64,
    pub option_rows: u64,
}

impl Db {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .max_connections(max_connections)
            .connect_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(3600))
            .sqlx_logging(false);

        let connection = Database::connect(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        connection
            .ping()
            .await
            .map_err(|e| Error::Database(format!("Connection test failed: {}", e)))?;

        info!("✅ Connected to database");
        Ok(Self { connection })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub async fn ping(&self) -> Result<()> {
        self.connection.ping().await?;
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.connection
            .close()
            .await
            .map_err(|e| Error::Database(format!("Failed to close connection: {}", e)))?;
        info!("Database connection closed");
        Ok(())
    }

    /// Append index rows in batches inside one transaction.
    pub async fn insert_index_records(&self, records: &[IndexRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let txn = self.connection.begin().await?;
        for chunk in records.chunks(INSERT_BATCH_SIZE) {
            let models = chunk.iter().map(Self::index_active_model);
            index_data::Entity::insert_many(models)
                .exec(&txn)
                .await
                .map_err(|e| Error::Database(format!("Failed to insert index data: {}", e)))?;
        }
        txn.commit().await?;

        Ok(records.len())
    }

    /// Append option quotes in batches inside one transaction.
    pub async fn insert_option_quotes(&self, quotes: &[OptionQuote]) -> Result<usize> {
        if quotes.is_empty() {
            return Ok(0);
        }

        let txn = self.connection.begin().await?;
        for chunk in quotes.chunks(INSERT_BATCH_SIZE) {
            let models = chunk.iter().map(Self::option_active_model);
            option_data::Entity::insert_many(models)
                .exec(&txn)
                .await
                .map_err(|e| Error::Database(format!("Failed to insert option data: {}", e)))?;
        }
        txn.commit().await?;

        Ok(quotes.len())
    }

    /// Most recently inserted index rows.
    pub async fn latest_index_rows(&self, limit: u64) -> Result<Vec<index_data::Model>> {
        Ok(index_data::Entity::find()
            .order_by_desc(index_data::Column::Id)
            .limit(limit)
            .all(&self.connection)
            .await?)
    }

    /// Most recently inserted option rows.
    pub async fn latest_option_rows(&self, limit: u64) -> Result<Vec<option_data::Model>> {
        Ok(option_data::Entity::find()
            .order_by_desc(option_data::Column::Id)
            .limit(limit)
            .all(&self.connection)
            .await?)
    }

    pub async fn table_counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            index_rows: index_data::Entity::find().count(&self.connection).await?,
            option_rows: option_data::Entity::find().count(&self.connection).await?,
        })
    }

    fn index_active_model(record: &IndexRecord) -> index_data::ActiveModel {
        index_data::ActiveModel {
            id: ActiveValue::NotSet,
            session_date: ActiveValue::Set(record.minute.date()),
            minute: ActiveValue::Set(record.minute),
            open: ActiveValue::Set(record.open),
            high: ActiveValue::Set(record.high),
            low: ActiveValue::Set(record.low),
            close: ActiveValue::Set(record.close),
            volume: ActiveValue::Set(record.volume),
        }
    }

    fn option_active_model(quote: &OptionQuote) -> option_data::ActiveModel {
        option_data::ActiveModel {
            id: ActiveValue::NotSet,
            session_date: ActiveValue::Set(quote.minute.date()),
            minute: ActiveValue::Set(quote.minute),
            strike: ActiveValue::Set(quote.strike),
            option_type: ActiveValue::Set(quote.option_type.as_str().to_string()),
            expiry_date: ActiveValue::Set(quote.expiry),
            bid_open: ActiveValue::Set(quote.bid),
            ask_open: ActiveValue::Set(quote.ask),
        }
    }

    fn into_quotes(rows: Vec<option_data::Model>) -> Vec<OptionQuote> {
        let total = rows.len();
        let quotes: Vec<OptionQuote> = rows
            .into_iter()
            .filter_map(option_data::Model::into_quote)
            .collect();
        if quotes.len() < total {
            warn!(
                "Skipped {} option rows with an unknown option type",
                total - quotes.len()
            );
        }
        quotes
    }
}

#[async_trait]
impl TickStore for Db {
    async fn session_index_ticks(&self, date: NaiveDate) -> Result<Vec<IndexTick>> {
        let rows = index_data::Entity::find()
            .filter(index_data::Column::SessionDate.eq(date))
            .order_by_asc(index_data::Column::Minute)
            .order_by_asc(index_data::Column::Id)
            .all(&self.connection)
            .await?;
        Ok(rows.into_iter().map(IndexTick::from).collect())
    }

    async fn session_dates(&self) -> Result<Vec<NaiveDate>> {
        let dates: Vec<NaiveDate> = index_data::Entity::find()
            .select_only()
            .column(index_data::Column::SessionDate)
            .distinct()
            .order_by_desc(index_data::Column::SessionDate)
            .into_tuple()
            .all(&self.connection)
            .await?;
        Ok(dates)
    }
}

#[async_trait]
impl QuoteStore for Db {
    async fn quotes_for_day(&self, date: NaiveDate) -> Result<Vec<OptionQuote>> {
        let rows = option_data::Entity::find()
            .filter(option_data::Column::SessionDate.eq(date))
            .order_by_asc(option_data::Column::Minute)
            .order_by_asc(option_data::Column::Id)
            .all(&self.connection)
            .await?;
        Ok(Self::into_quotes(rows))
    }

    async fn quotes_for_minute_expiry(
        &self,
        minute: NaiveDateTime,
        expiry: NaiveDate,
    ) -> Result<Vec<OptionQuote>> {
        let rows = option_data::Entity::find()
            .filter(option_data::Column::Minute.eq(minute))
            .filter(option_data::Column::ExpiryDate.eq(expiry))
            .order_by_asc(option_data::Column::Strike)
            .order_by_asc(option_data::Column::Id)
            .all(&self.connection)
            .await?;
        Ok(Self::into_quotes(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::OptionType;
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    async fn memory_db() -> Db {
        let db = Db::new("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn minute(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record(at: NaiveDateTime, open: rust_decimal::Decimal) -> IndexRecord {
        IndexRecord {
            minute: at,
            open,
            high: None,
            low: None,
            close: None,
            volume: Some(1200),
        }
    }

    fn quote(at: NaiveDateTime, strike: i64, option_type: OptionType, expiry_day: u32) -> OptionQuote {
        OptionQuote {
            minute: at,
            strike: strike.into(),
            option_type,
            expiry: NaiveDate::from_ymd_opt(2024, 3, expiry_day).unwrap(),
            bid: Some(dec!(1.25)),
            ask: None,
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = memory_db().await;
        let second = db.migrate().await.unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.already_applied, 6);
        assert!(second.is_clean());
    }

    #[tokio::test]
    async fn test_session_ticks_and_dates() {
        let db = memory_db().await;
        let records = vec![
            record(minute(1, 13, 31), dec!(500.75)),
            record(minute(1, 13, 30), dec!(500.25)),
            record(minute(4, 13, 30), dec!(505.5)),
        ];
        assert_eq!(db.insert_index_records(&records).await.unwrap(), 3);

        let ticks = db
            .session_index_ticks(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(
            ticks,
            vec![
                IndexTick::new(minute(1, 13, 30), dec!(500.25)),
                IndexTick::new(minute(1, 13, 31), dec!(500.75)),
            ]
        );

        let dates = db.session_dates().await.unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_quote_queries() {
        let db = memory_db().await;
        let quotes = vec![
            quote(minute(1, 13, 30), 502, OptionType::Put, 1),
            quote(minute(1, 13, 30), 498, OptionType::Call, 1),
            quote(minute(1, 13, 30), 500, OptionType::Call, 2),
            quote(minute(1, 13, 31), 500, OptionType::Call, 1),
            quote(minute(4, 13, 30), 505, OptionType::Call, 4),
        ];
        assert_ok!(db.insert_option_quotes(&quotes).await);

        let day = db
            .quotes_for_day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(day.len(), 4);

        let at = db
            .quotes_for_minute_expiry(minute(1, 13, 30), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap();
        let strikes: Vec<_> = at.iter().map(|q| q.strike).collect();
        assert_eq!(strikes, vec![dec!(498), dec!(502)]);
        assert_eq!(at[0].bid, Some(dec!(1.25)));
        assert_eq!(at[0].ask, None);
        assert_eq!(at[1].option_type, OptionType::Put);
    }

    #[tokio::test]
    async fn test_previews_and_counts() {
        let db = memory_db().await;
        let records: Vec<IndexRecord> = (0..15)
            .map(|i| record(minute(1, 14, i), dec!(500)))
            .collect();
        db.insert_index_records(&records).await.unwrap();

        let latest = db.latest_index_rows(10).await.unwrap();
        assert_eq!(latest.len(), 10);
        assert_eq!(latest[0].minute, minute(1, 14, 14));

        let counts = db.table_counts().await.unwrap();
        assert_eq!(counts.index_rows, 15);
        assert_eq!(counts.option_rows, 0);
        assert!(db.latest_option_rows(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_insert_is_noop() {
        let db = memory_db().await;
        assert_eq!(db.insert_index_records(&[]).await.unwrap(), 0);
        assert_eq!(db.insert_option_quotes(&[]).await.unwrap(), 0);
        assert_ok!(db.close().await);
    }
}

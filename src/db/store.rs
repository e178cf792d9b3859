//! Read interfaces the analytics depend on.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::Result;
use crate::market::{IndexTick, OptionQuote};

#[async_trait]
pub trait TickStore: Send + Sync {
    /// Index ticks of one calendar day, ordered by minute.
    async fn session_index_ticks(&self, date: NaiveDate) -> Result<Vec<IndexTick>>;

    /// Dates with index data, newest first.
    async fn session_dates(&self) -> Result<Vec<NaiveDate>>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Every quote stamped on `date`, across all expiries and strikes.
    async fn quotes_for_day(&self, date: NaiveDate) -> Result<Vec<OptionQuote>>;

    /// Quotes for one minute and one expiry, ordered by strike.
    async fn quotes_for_minute_expiry(
        &self,
        minute: NaiveDateTime,
        expiry: NaiveDate,
    ) -> Result<Vec<OptionQuote>>;
}

#[cfg(test)]
pub mod memory {
    //! In-process store for exercising the analytics without a database.

    use super::*;

    #[derive(Debug, Default, Clone)]
    pub struct MemoryStore {
        pub ticks: Vec<IndexTick>,
        pub quotes: Vec<OptionQuote>,
    }

    #[async_trait]
    impl TickStore for MemoryStore {
        async fn session_index_ticks(&self, date: NaiveDate) -> Result<Vec<IndexTick>> {
            let mut ticks: Vec<IndexTick> = self
                .ticks
                .iter()
                .filter(|t| t.session_date() == date)
                .cloned()
                .collect();
            ticks.sort_by_key(|t| t.minute);
            Ok(ticks)
        }

        async fn session_dates(&self) -> Result<Vec<NaiveDate>> {
            let mut dates: Vec<NaiveDate> = self.ticks.iter().map(|t| t.session_date()).collect();
            dates.sort_unstable_by(|a, b| b.cmp(a));
            dates.dedup();
            Ok(dates)
        }
    }

    #[async_trait]
    impl QuoteStore for MemoryStore {
        async fn quotes_for_day(&self, date: NaiveDate) -> Result<Vec<OptionQuote>> {
            Ok(self
                .quotes
                .iter()
                .filter(|q| q.minute.date() == date)
                .cloned()
                .collect())
        }

        async fn quotes_for_minute_expiry(
            &self,
            minute: NaiveDateTime,
            expiry: NaiveDate,
        ) -> Result<Vec<OptionQuote>> {
            let mut quotes: Vec<OptionQuote> = self
                .quotes
                .iter()
                .filter(|q| q.minute == minute && q.expiry == expiry)
                .cloned()
                .collect();
            quotes.sort_by_key(|q| q.strike);
            Ok(quotes)
        }
    }
}

//! Strike-banded bid/ask chain around the ATM strike.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::db::store::QuoteStore;
use crate::error::Result;
use crate::market::{OptionQuote, OptionType};

/// One strike of the ladder. Unset sides mean no quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainRow {
    pub strike: i64,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub call_bid: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub call_ask: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub put_bid: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub put_ask: Option<Decimal>,
}

impl ChainRow {
    fn empty(strike: i64) -> Self {
        Self {
            strike,
            call_bid: None,
            call_ask: None,
            put_bid: None,
            put_ask: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.call_bid.is_none()
            && self.call_ask.is_none()
            && self.put_bid.is_none()
            && self.put_ask.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionChain {
    pub atm_strike: i64,
    pub radius: u32,
    pub minute: NaiveDateTime,
    pub expiry: NaiveDate,
    /// Always `2 * radius + 1` rows, ascending by strike.
    pub rows: Vec<ChainRow>,
    /// Quotes found for the minute and expiry, in or out of the ladder.
    pub quote_count: usize,
    /// Ladder rows carrying at least one quote.
    pub quoted_strikes: usize,
}

impl OptionChain {
    pub fn lower_strike(&self) -> i64 {
        self.atm_strike - i64::from(self.radius)
    }

    pub fn upper_strike(&self) -> i64 {
        self.atm_strike + i64::from(self.radius)
    }

    pub fn has_quotes(&self) -> bool {
        self.quote_count > 0
    }
}

/// Build the ladder `atm - radius ..= atm + radius` from raw quotes.
///
/// Quotes for other minutes or expiries are ignored. When a strike has more
/// than one row for the same side, the first one wins.
pub fn assemble_chain(
    atm_strike: i64,
    radius: u32,
    minute: NaiveDateTime,
    expiry: NaiveDate,
    quotes: &[OptionQuote],
) -> OptionChain {
    let lower = atm_strike - i64::from(radius);
    let upper = atm_strike + i64::from(radius);

    let mut quote_count = 0;
    let mut sides: HashMap<i64, (Option<&OptionQuote>, Option<&OptionQuote>)> = HashMap::new();

    for quote in quotes
        .iter()
        .filter(|q| q.minute == minute && q.expiry == expiry)
    {
        quote_count += 1;

        let Some(strike) = integer_strike(quote.strike) else {
            continue;
        };
        if strike < lower || strike > upper {
            continue;
        }

        let entry = sides.entry(strike).or_default();
        let slot = match quote.option_type {
            OptionType::Call => &mut entry.0,
            OptionType::Put => &mut entry.1,
        };
        if slot.is_none() {
            *slot = Some(quote);
        } else {
            debug!(
                "Duplicate {} quote at strike {} for {}",
                quote.option_type.as_str(),
                strike,
                minute
            );
        }
    }

    let rows: Vec<ChainRow> = (lower..=upper)
        .map(|strike| match sides.get(&strike) {
            Some((call, put)) => ChainRow {
                strike,
                call_bid: call.and_then(|q| q.bid),
                call_ask: call.and_then(|q| q.ask),
                put_bid: put.and_then(|q| q.bid),
                put_ask: put.and_then(|q| q.ask),
            },
            None => ChainRow::empty(strike),
        })
        .collect();

    let quoted_strikes = rows.iter().filter(|r| !r.is_empty()).count();

    OptionChain {
        atm_strike,
        radius,
        minute,
        expiry,
        rows,
        quote_count,
        quoted_strikes,
    }
}

/// Fetch the quotes for one minute and expiry and assemble the ladder.
pub async fn load_chain<S>(
    store: &S,
    atm_strike: i64,
    radius: u32,
    minute: NaiveDateTime,
    expiry: NaiveDate,
) -> Result<OptionChain>
where
    S: QuoteStore + ?Sized,
{
    let quotes = store.quotes_for_minute_expiry(minute, expiry).await?;
    Ok(assemble_chain(atm_strike, radius, minute, expiry, &quotes))
}

fn integer_strike(strike: Decimal) -> Option<i64> {
    if strike.fract().is_zero() {
        strike.to_i64()
    } else {
        None
    }
}

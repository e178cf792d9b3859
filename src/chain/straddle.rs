//! ATM straddle mid-price series over a trading session.
//!
//! For every session minute and expiry offset the quoted strike nearest the
//! underlying open is selected and the call and put mids at that strike are
//! summed. Minutes without usable quotes stay in the series as missing
//! points so every series lines up with the session minutes.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::db::store::QuoteStore;
use crate::error::Result;
use crate::market::{ExpiryOffset, IndexTick, OptionQuote, OptionType};

/// Why a point has no price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    Priced,
    NoQuotesAtMinute,
    PartialQuote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StraddlePoint {
    pub minute: NaiveDateTime,
    #[serde(with = "rust_decimal::serde::float")]
    pub underlying: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub strike: Option<Decimal>,
    pub status: PointStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StraddleSeries {
    pub offset: ExpiryOffset,
    pub expiry: NaiveDate,
    pub points: Vec<StraddlePoint>,
}

impl StraddleSeries {
    pub fn label(&self) -> &'static str {
        self.offset.label()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn priced_count(&self) -> usize {
        self.points.iter().filter(|p| p.price.is_some()).count()
    }
}

/// Pick the strike closest to `underlying`. On equal distance the lower
/// strike wins.
pub fn nearest_strike<I>(strikes: I, underlying: Decimal) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let ordered: BTreeSet<Decimal> = strikes.into_iter().collect();
    let mut best: Option<(Decimal, Decimal)> = None;
    for strike in ordered {
        let distance = (strike - underlying).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((strike, distance)),
        }
    }
    best.map(|(strike, _)| strike)
}

/// Build one series per offset, each aligned 1:1 with `minutes`.
///
/// Only quotes carrying both bid and ask take part in strike selection.
pub fn build_straddle_series(
    session_date: NaiveDate,
    minutes: &[IndexTick],
    quotes: &[OptionQuote],
    offsets: &[ExpiryOffset],
) -> Vec<StraddleSeries> {
    let mut by_minute_expiry: HashMap<(NaiveDateTime, NaiveDate), Vec<&OptionQuote>> =
        HashMap::new();
    for quote in quotes.iter().filter(|q| q.is_two_sided()) {
        by_minute_expiry
            .entry((quote.minute, quote.expiry))
            .or_default()
            .push(quote);
    }

    offsets
        .iter()
        .map(|&offset| {
            let expiry = offset.expiry_for(session_date);
            let points: Vec<StraddlePoint> = minutes
                .iter()
                .map(|tick| {
                    price_point(
                        tick,
                        by_minute_expiry
                            .get(&(tick.minute, expiry))
                            .map(Vec::as_slice)
                            .unwrap_or(&[]),
                    )
                })
                .collect();

            let series = StraddleSeries {
                offset,
                expiry,
                points,
            };
            debug!(
                "{} straddle series for {}: {}/{} minutes priced",
                series.label(),
                session_date,
                series.priced_count(),
                series.len()
            );
            series
        })
        .collect()
}

/// Load the day's quotes and build series for every offset.
pub async fn load_straddles<S>(
    store: &S,
    session_date: NaiveDate,
    minutes: &[IndexTick],
) -> Result<Vec<StraddleSeries>>
where
    S: QuoteStore + ?Sized,
{
    if minutes.is_empty() {
        return Ok(build_straddle_series(
            session_date,
            minutes,
            &[],
            &ExpiryOffset::ALL,
        ));
    }
    let quotes = store.quotes_for_day(session_date).await?;
    Ok(build_straddle_series(
        session_date,
        minutes,
        &quotes,
        &ExpiryOffset::ALL,
    ))
}

fn price_point(tick: &IndexTick, group: &[&OptionQuote]) -> StraddlePoint {
    let missing = |strike: Option<Decimal>, status: PointStatus| StraddlePoint {
        minute: tick.minute,
        underlying: tick.open,
        price: None,
        strike,
        status,
    };

    let Some(strike) = nearest_strike(group.iter().map(|q| q.strike), tick.open) else {
        return missing(None, PointStatus::NoQuotesAtMinute);
    };

    let leg = |option_type: OptionType| {
        group
            .iter()
            .find(|q| q.strike == strike && q.option_type == option_type)
            .and_then(|q| q.mid())
    };

    match (leg(OptionType::Call), leg(OptionType::Put)) {
        (Some(call_mid), Some(put_mid)) => StraddlePoint {
            minute: tick.minute,
            underlying: tick.open,
            price: Some(call_mid + put_mid),
            strike: Some(strike),
            status: PointStatus::Priced,
        },
        _ => missing(Some(strike), PointStatus::PartialQuote),
    }
}

//! Trading session loading, the regular-hours window and minute selection.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;

use crate::constants::{DEFAULT_SESSION_CLOSE, DEFAULT_SESSION_OPEN};
use crate::db::store::TickStore;
use crate::error::{Error, Result};
use crate::market::IndexTick;

/// Time-of-day bounds of the regular session, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl SessionWindow {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open > close {
            return Err(Error::Config(format!(
                "session open {} is after close {}",
                open, close
            )));
        }
        Ok(Self { open, close })
    }

    pub fn contains(&self, minute: NaiveDateTime) -> bool {
        let time = minute.time();
        time >= self.open && time <= self.close
    }
}

impl Default for SessionWindow {
    fn default() -> Self {
        let parse = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").unwrap_or(NaiveTime::MIN);
        Self {
            open: parse(DEFAULT_SESSION_OPEN),
            close: parse(DEFAULT_SESSION_CLOSE),
        }
    }
}

/// All index ticks of one calendar day, ordered by minute.
#[derive(Debug, Clone)]
pub struct Session {
    pub date: NaiveDate,
    ticks: Vec<IndexTick>,
}

/// Minute picked for the chain view, plus its slider position within the
/// trading window when the window has ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteSelection {
    pub minute: NaiveDateTime,
    pub slider_index: Option<usize>,
}

impl Session {
    pub async fn load<S>(store: &S, date: NaiveDate) -> Result<Self>
    where
        S: TickStore + ?Sized,
    {
        let ticks = store.session_index_ticks(date).await?;
        Self::from_ticks(date, ticks)
    }

    /// Keeps ticks of `date` only, sorted, first row per minute.
    pub fn from_ticks(date: NaiveDate, mut ticks: Vec<IndexTick>) -> Result<Self> {
        ticks.retain(|t| t.session_date() == date);
        ticks.sort_by_key(|t| t.minute);

        let before = ticks.len();
        let mut seen = HashSet::with_capacity(before);
        ticks.retain(|t| seen.insert(t.minute));
        if ticks.len() < before {
            warn!(
                "Dropped {} duplicate index ticks for {}",
                before - ticks.len(),
                date
            );
        }

        if ticks.is_empty() {
            return Err(Error::NoSessionData(date));
        }
        Ok(Self { date, ticks })
    }

    pub fn ticks(&self) -> &[IndexTick] {
        &self.ticks
    }

    pub fn tick_at(&self, minute: NaiveDateTime) -> Option<&IndexTick> {
        self.ticks
            .binary_search_by_key(&minute, |t| t.minute)
            .ok()
            .map(|i| &self.ticks[i])
    }

    /// Ticks inside the trading window; the minute universe of the straddle
    /// series.
    pub fn trading_minutes(&self, window: &SessionWindow) -> Vec<IndexTick> {
        self.ticks
            .iter()
            .filter(|t| window.contains(t.minute))
            .cloned()
            .collect()
    }

    /// Resolve the minute to display.
    ///
    /// Without a request the first tick of the day is used. When the window
    /// has ticks and the choice is not one of them, the last in-window minute
    /// is used instead.
    pub fn select_minute(
        &self,
        requested: Option<NaiveDateTime>,
        window: &SessionWindow,
    ) -> MinuteSelection {
        let first = self.ticks[0].minute;
        let mut minute = requested.unwrap_or(first);

        let in_window: Vec<NaiveDateTime> = self
            .ticks
            .iter()
            .map(|t| t.minute)
            .filter(|m| window.contains(*m))
            .collect();

        let slider_index = match in_window.iter().position(|m| *m == minute) {
            Some(i) => Some(i),
            None => match in_window.last() {
                Some(last) => {
                    minute = *last;
                    Some(in_window.len() - 1)
                }
                None => None,
            },
        };

        MinuteSelection {
            minute,
            slider_index,
        }
    }
}

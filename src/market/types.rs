//! Market data types shared by the store, the ingest path and the analytics.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    /// Storage code, as found in the option CSV dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

/// One minute bar of the underlying index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexTick {
    pub minute: NaiveDateTime,
    pub open: Decimal,
}

impl IndexTick {
    pub fn new(minute: NaiveDateTime, open: Decimal) -> Self {
        Self { minute, open }
    }

    pub fn session_date(&self) -> NaiveDate {
        self.minute.date()
    }
}

/// A single option quote at a minute. Missing bid or ask means no quote on
/// that side, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub minute: NaiveDateTime,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl OptionQuote {
    /// Mid price, available only when both sides are quoted.
    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn is_two_sided(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }
}

/// Calendar-day distance between the session date and an expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ExpiryOffset {
    #[default]
    #[serde(rename = "0DTE")]
    ZeroDte,
    #[serde(rename = "1DTE")]
    OneDte,
    #[serde(rename = "2DTE")]
    TwoDte,
}

impl ExpiryOffset {
    pub const ALL: [ExpiryOffset; 3] = [Self::ZeroDte, Self::OneDte, Self::TwoDte];

    pub fn days(&self) -> i64 {
        match self {
            Self::ZeroDte => 0,
            Self::OneDte => 1,
            Self::TwoDte => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ZeroDte => "0DTE",
            Self::OneDte => "1DTE",
            Self::TwoDte => "2DTE",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|o| o.label().eq_ignore_ascii_case(s.trim()))
    }

    pub fn index(&self) -> usize {
        self.days() as usize
    }

    pub fn expiry_for(&self, session_date: NaiveDate) -> NaiveDate {
        session_date + Duration::days(self.days())
    }
}

/// Which straddle series the comparison chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    All,
    ZeroVsOne,
    ZeroVsTwo,
    OneVsTwo,
}

impl Comparison {
    /// Unknown codes fall back to showing all three.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "0v1" => Self::ZeroVsOne,
            "0v2" => Self::ZeroVsTwo,
            "1v2" => Self::OneVsTwo,
            _ => Self::All,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ZeroVsOne => "0v1",
            Self::ZeroVsTwo => "0v2",
            Self::OneVsTwo => "1v2",
        }
    }

    pub fn offsets(&self) -> &'static [ExpiryOffset] {
        use ExpiryOffset::*;
        match self {
            Self::All => &[ZeroDte, OneDte, TwoDte],
            Self::ZeroVsOne => &[ZeroDte, OneDte],
            Self::ZeroVsTwo => &[ZeroDte, TwoDte],
            Self::OneVsTwo => &[OneDte, TwoDte],
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::All => "0DTE vs 1DTE vs 2DTE",
            Self::ZeroVsOne => "0DTE vs 1DTE",
            Self::ZeroVsTwo => "0DTE vs 2DTE",
            Self::OneVsTwo => "1DTE vs 2DTE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_option_type_parse() {
        assert_eq!(OptionType::parse("C"), Some(OptionType::Call));
        assert_eq!(OptionType::parse(" put "), Some(OptionType::Put));
        assert_eq!(OptionType::parse("X"), None);
        assert_eq!(OptionType::Put.as_str(), "P");
    }

    #[test]
    fn test_mid_requires_both_sides() {
        let minute = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(13, 30, 0)
            .unwrap();
        let mut quote = OptionQuote {
            minute,
            strike: dec!(500),
            option_type: OptionType::Call,
            expiry: minute.date(),
            bid: Some(dec!(1.10)),
            ask: Some(dec!(1.30)),
        };
        assert_eq!(quote.mid(), Some(dec!(1.20)));

        quote.ask = None;
        assert_eq!(quote.mid(), None);
        assert!(!quote.is_two_sided());
    }

    #[test]
    fn test_expiry_offsets() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        assert_eq!(
            ExpiryOffset::TwoDte.expiry_for(date),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(ExpiryOffset::from_label("1dte"), Some(ExpiryOffset::OneDte));
        assert_eq!(ExpiryOffset::from_label("5DTE"), None);
        assert_eq!(ExpiryOffset::default(), ExpiryOffset::ZeroDte);
    }

    #[test]
    fn test_comparison_selection() {
        assert_eq!(
            Comparison::parse("0v2").offsets(),
            &[ExpiryOffset::ZeroDte, ExpiryOffset::TwoDte]
        );
        assert_eq!(Comparison::parse("bogus"), Comparison::All);
        assert_eq!(Comparison::OneVsTwo.title(), "1DTE vs 2DTE");
    }
}

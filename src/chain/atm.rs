//! At-the-money strike resolution.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::market::IndexTick;

/// ATM strike resolved against the underlying open at one minute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtmResolution {
    pub minute: NaiveDateTime,
    #[serde(with = "rust_decimal::serde::float")]
    pub open: Decimal,
    pub strike: i64,
}

/// Round an underlying price to the nearest integer strike, half up.
pub fn resolve_atm(price: Decimal) -> Result<i64> {
    let floor = price.floor();
    let frac = price - floor;
    let strike = if frac < Decimal::new(5, 1) {
        floor
    } else {
        price.ceil()
    };
    strike
        .to_i64()
        .ok_or_else(|| Error::InvalidPrice(price.to_string()))
}

/// Resolve the ATM strike at `minute`, failing when the session has no tick
/// there.
pub fn atm_at(ticks: &[IndexTick], minute: NaiveDateTime) -> Result<AtmResolution> {
    let tick = ticks
        .iter()
        .find(|t| t.minute == minute)
        .ok_or(Error::NoReferenceTick(minute))?;

    Ok(AtmResolution {
        minute,
        open: tick.open,
        strike: resolve_atm(tick.open)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn minute(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_half_rounds_up() {
        assert_eq!(resolve_atm(dec!(500.5)).unwrap(), 501);
        assert_eq!(resolve_atm(dec!(0.5)).unwrap(), 1);
        assert_eq!(resolve_atm(dec!(499.50)).unwrap(), 500);
    }

    #[test]
    fn test_below_half_rounds_down() {
        assert_eq!(resolve_atm(dec!(500.2)).unwrap(), 500);
        assert_eq!(resolve_atm(dec!(500.4999)).unwrap(), 500);
        assert_eq!(resolve_atm(dec!(500)).unwrap(), 500);
    }

    #[test]
    fn test_above_half_rounds_up() {
        assert_eq!(resolve_atm(dec!(500.6)).unwrap(), 501);
        assert_eq!(resolve_atm(dec!(500.99)).unwrap(), 501);
    }

    #[test]
    fn test_atm_per_minute() {
        let ticks = vec![
            IndexTick::new(minute(13, 30), dec!(500.2)),
            IndexTick::new(minute(13, 31), dec!(500.6)),
        ];

        let first = atm_at(&ticks, minute(13, 30)).unwrap();
        assert_eq!(first.strike, 500);
        assert_eq!(first.open, dec!(500.2));

        assert_eq!(atm_at(&ticks, minute(13, 31)).unwrap().strike, 501);
    }

    #[test]
    fn test_missing_reference_tick() {
        let ticks = vec![IndexTick::new(minute(13, 30), dec!(500.2))];
        let err = atm_at(&ticks, minute(14, 0)).unwrap_err();
        assert!(matches!(err, Error::NoReferenceTick(m) if m == minute(14, 0)));
    }
}

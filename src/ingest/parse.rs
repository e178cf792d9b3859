//! Field parsers for the CSV dumps. Each returns `None` for a value that
//! cannot be used, and the caller decides whether that drops the row.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

// Dash-separated dates are day-first (the format these dumps were exported
// in historically); slash-separated dates are month-first.
const NAIVE_FORMATS: [&str; 10] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"];

/// Drop seconds and sub-seconds.
pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Index CSV timestamp. Offset-carrying values are converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(truncate_to_minute(dt.naive_utc()));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(truncate_to_minute(dt.naive_utc()));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(truncate_to_minute)
}

/// Option CSV minute, given as unix seconds (integer or float).
pub fn parse_unix_minute(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    let secs = match s.parse::<i64>() {
        Ok(secs) => secs,
        Err(_) => {
            let f = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
            f.floor() as i64
        }
    };
    DateTime::from_timestamp(secs, 0).map(|dt| truncate_to_minute(dt.naive_utc()))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    // Tolerate a time component, e.g. `2024-03-01 00:00:00`.
    let head = s.split([' ', 'T']).next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

pub fn parse_volume(raw: &str) -> Option<i64> {
    let s = raw.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| parse_decimal(s).and_then(|d| d.trunc().to_i64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn minute(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = minute(1, 13, 30);
        for raw in [
            "2024-03-01 13:30:00",
            "2024-03-01 13:30",
            "2024-03-01T13:30:45",
            "01-03-2024 13:30",
            "03/01/2024 13:30",
            "2024-03-01T13:30:00Z",
            "2024-03-01 13:30:00+00:00",
            " 2024-03-01 13:30:59.5 ",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{}", raw);
        }
    }

    #[test]
    fn test_offsets_convert_to_utc() {
        assert_eq!(
            parse_timestamp("2024-03-01T08:30:00-05:00"),
            Some(minute(1, 13, 30))
        );
    }

    #[test]
    fn test_bad_timestamps() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2024-13-01 13:30"), None);
    }

    #[test]
    fn test_unix_minute() {
        // 2024-03-01 13:30:00 UTC
        assert_eq!(parse_unix_minute("1709299800"), Some(minute(1, 13, 30)));
        assert_eq!(parse_unix_minute("1709299842.0"), Some(minute(1, 13, 30)));
        assert_eq!(parse_unix_minute("abc"), None);
        assert_eq!(parse_unix_minute("inf"), None);
    }

    #[test]
    fn test_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_date("2024-03-01"), Some(d));
        assert_eq!(parse_date("20240301"), Some(d));
        assert_eq!(parse_date("2024-03-01 00:00:00"), Some(d));
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_decimal(" 1.25 "), Some(dec!(1.25)));
        assert_eq!(parse_decimal("1e-2"), Some(dec!(0.01)));
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_volume("1200"), Some(1200));
        assert_eq!(parse_volume("1200.0"), Some(1200));
        assert_eq!(parse_volume("x"), None);
    }
}

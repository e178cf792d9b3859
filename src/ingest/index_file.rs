use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::parse::{parse_decimal, parse_timestamp, parse_volume};
use super::{ColumnMap, Parsed};
use crate::error::Result;

pub const DATETIME_COLUMN: &str = "datetime_UTC";
const REQUIRED: [&str; 2] = [DATETIME_COLUMN, "open"];
const OPTIONAL: [&str; 4] = ["high", "low", "close", "volume"];

/// One validated row of an index CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub minute: NaiveDateTime,
    pub open: Decimal,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
}

/// Parse an index minute-bar CSV. Rows with an unusable timestamp or open
/// are dropped.
pub fn parse_index_csv(data: &[u8]) -> Result<Parsed<IndexRecord>> {
    let mut reader = super::reader(data);
    let columns = ColumnMap::new(reader.headers()?, &REQUIRED, &OPTIONAL)?;

    let mut parsed = Parsed::new(columns.ignored.clone());
    for row in reader.records() {
        let row = row?;
        parsed.original_rows += 1;

        let minute = columns.get(&row, DATETIME_COLUMN).and_then(parse_timestamp);
        let open = columns.get(&row, "open").and_then(parse_decimal);

        match (minute, open) {
            (Some(minute), Some(open)) => parsed.rows.push(IndexRecord {
                minute,
                open,
                high: columns.get(&row, "high").and_then(parse_decimal),
                low: columns.get(&row, "low").and_then(parse_decimal),
                close: columns.get(&row, "close").and_then(parse_decimal),
                volume: columns.get(&row, "volume").and_then(parse_volume),
            }),
            _ => parsed.dropped_rows += 1,
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parses_and_drops_invalid_rows() {
        let csv = "datetime_UTC,open,high,low,close,volume,vwap\n\
                   2024-03-01 13:30:00,500.2,500.9,500.1,500.5,1200,500.4\n\
                   garbage,500.3,,,,,\n\
                   2024-03-01 13:31:00,,,,,,\n\
                   2024-03-01 13:32:00,500.6,,,,,\n";
        let parsed = parse_index_csv(csv.as_bytes()).unwrap();

        assert_eq!(parsed.original_rows, 4);
        assert_eq!(parsed.processed_rows(), 2);
        assert_eq!(parsed.dropped_rows, 2);
        assert_eq!(parsed.ignored_columns, vec!["vwap".to_string()]);

        let first = &parsed.rows[0];
        assert_eq!(
            first.minute,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(13, 30, 0)
                .unwrap()
        );
        assert_eq!(first.open, dec!(500.2));
        assert_eq!(first.high, Some(dec!(500.9)));
        assert_eq!(first.volume, Some(1200));
        assert_eq!(parsed.rows[1].close, None);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "timestamp,open\n2024-03-01 13:30:00,500.2\n";
        match parse_index_csv(csv.as_bytes()) {
            Err(Error::Ingest(msg)) => assert_eq!(msg, "Missing required column: datetime_UTC"),
            other => panic!("unexpected: {:?}", other.map(|p| p.rows)),
        }
    }

    #[test]
    fn test_header_case_is_ignored() {
        let csv = "DATETIME_UTC,Open\n2024-03-01 13:30,500.2\n";
        let parsed = parse_index_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.processed_rows(), 1);
    }
}

use super::parse::{parse_date, parse_decimal, parse_unix_minute};
use super::{ColumnMap, Parsed};
use crate::error::Result;
use crate::market::{OptionQuote, OptionType};

pub const MINUTE_COLUMN: &str = "UTC_MINUTE";
const REQUIRED: [&str; 6] = [
    MINUTE_COLUMN,
    "STRIKE",
    "OPTION_TYPE",
    "EXPIRY_DATE",
    "bid_open",
    "ask_open",
];

/// Parse an option quote CSV. Rows whose minute, strike, type or expiry
/// cannot be read are dropped; unreadable bid or ask is kept as no quote.
pub fn parse_option_csv(data: &[u8]) -> Result<Parsed<OptionQuote>> {
    let mut reader = super::reader(data);
    let columns = ColumnMap::new(reader.headers()?, &REQUIRED, &[])?;

    let mut parsed = Parsed::new(columns.ignored.clone());
    for row in reader.records() {
        let row = row?;
        parsed.original_rows += 1;

        let minute = columns.get(&row, MINUTE_COLUMN).and_then(parse_unix_minute);
        let strike = columns.get(&row, "STRIKE").and_then(parse_decimal);
        let option_type = columns.get(&row, "OPTION_TYPE").and_then(OptionType::parse);
        let expiry = columns.get(&row, "EXPIRY_DATE").and_then(parse_date);

        match (minute, strike, option_type, expiry) {
            (Some(minute), Some(strike), Some(option_type), Some(expiry)) => {
                parsed.rows.push(OptionQuote {
                    minute,
                    strike,
                    option_type,
                    expiry,
                    bid: columns.get(&row, "bid_open").and_then(parse_decimal),
                    ask: columns.get(&row, "ask_open").and_then(parse_decimal),
                })
            }
            _ => parsed.dropped_rows += 1,
        }
    }

    Ok(parsed)
}

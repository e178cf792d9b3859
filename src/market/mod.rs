pub mod types;

pub use types::{Comparison, ExpiryOffset, IndexTick, OptionQuote, OptionType};

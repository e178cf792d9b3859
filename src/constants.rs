pub const INDEX_TABLE: &str = "index_data";
pub const OPTION_TABLE: &str = "option_data";
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

// Default regular-hours window for SPY minute bars, in UTC.
pub const DEFAULT_SESSION_OPEN: &str = "13:30";
pub const DEFAULT_SESSION_CLOSE: &str = "20:15";

pub const DEFAULT_STRIKE_STEPS: u32 = 10;
pub const DEFAULT_MAX_STRIKE_STEPS: u32 = 200;
pub const DEFAULT_UNDERLYING: &str = "SPY";

pub const PREVIEW_LIMIT: u64 = 10;
pub const INSERT_BATCH_SIZE: usize = 1000;

/// Query-string format for minutes, e.g. `2024-03-01 13:30`.
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DISPLAY_DATE_FORMAT: &str = "%d %b %Y";
pub const TIME_LABEL_FORMAT: &str = "%H:%M";

pub const CHART_TICK_HOURS: [u32; 8] = [13, 14, 15, 16, 17, 18, 19, 20];
pub const OVERLAY_COLORS: [&str; 3] = ["#ea170c", "#2e21e0", "#2edb2e"];
pub const COMPARISON_COLORS: [&str; 3] = ["#d83813", "#1934cd", "#52ff33"];
pub const PRICE_COLOR: &str = "#0066ff";

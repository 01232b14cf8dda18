//! On-disk file layouts

/// Header of a cached candle file, in column order
pub const CANDLE_HEADERS: [&str; 6] = ["Timestamp", "Open", "High", "Low", "Close", "Volume"];

/// Column prefix for a retracement level in enriched exports (`fib_0.382`)
pub const LEVEL_COLUMN_PREFIX: &str = "fib_";

/// Suffix appended to every candle cache file name
pub const CANDLE_FILE_SUFFIX: &str = "data.csv";

/// Name of the signals file produced by the offline demo
pub const SYNTHETIC_SIGNALS_FILE: &str = "synthetic_signals.json";

/// Candle cache file name for a symbol and timeframe.
///
/// `BTC/USDT` on `1d` becomes `BTC_USDT_1d_data.csv`.
pub fn candle_file_name(symbol: &str, timeframe: &str) -> String {
    format!(
        "{}_{}_{}",
        symbol.replace('/', "_"),
        timeframe,
        CANDLE_FILE_SUFFIX
    )
}

/// Column name for a level, given its formatted ratio
pub fn level_column(ratio: &str) -> String {
    format!("{LEVEL_COLUMN_PREFIX}{ratio}")
}

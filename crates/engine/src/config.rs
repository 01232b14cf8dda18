//! Runtime configuration
//!
//! Settings are plain values passed into the pipeline and strategy. They can
//! be built from defaults, from `RETRACE_*` environment variables, or from a
//! JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::fibonacci::DEFAULT_RATIOS;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

pub const DEFAULT_SYMBOLS: [&str; 25] = [
    "BTC/USDT", "ETH/USDT", "BNB/USDT", "XRP/USDT", "ADA/USDT", "DOGE/USDT", "MATIC/USDT",
    "SOL/USDT", "DOT/USDT", "LTC/USDT", "SHIB/USDT", "AVAX/USDT", "TRX/USDT", "LINK/USDT",
    "ATOM/USDT", "ETC/USDT", "XLM/USDT", "ALGO/USDT", "VET/USDT", "FIL/USDT", "MANA/USDT",
    "SAND/USDT", "AXS/USDT", "THETA/USDT", "XTZ/USDT",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parameters of the crossover strategy and the enricher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Fast SMA window (default: 10)
    pub fast_window: usize,
    /// Slow SMA window (default: 25). Expected to exceed `fast_window`.
    pub slow_window: usize,
    /// Retracement ratios attached to each bar
    pub ratios: Vec<f64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            fast_window: 10,
            slow_window: 25,
            ratios: DEFAULT_RATIOS.to_vec(),
        }
    }
}

/// Exchange endpoint and the symbols to track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    pub symbols: Vec<String>,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// History window and on-disk locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Candle interval, e.g. `1h`, `1d`
    pub timeframe: String,
    /// How many days of history to download
    pub lookback_days: u32,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            timeframe: "1d".to_string(),
            lookback_days: 180,
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data/outputs"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub exchange: ExchangeSettings,
    pub data: DataSettings,
    pub strategy: StrategyConfig,
}

impl Settings {
    /// Build settings from `RETRACE_*` environment variables over the defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(url) = lookup("RETRACE_BASE_URL") {
            settings.exchange.base_url = url;
        }
        if let Some(raw) = lookup("RETRACE_SYMBOLS") {
            let symbols = parse_symbols(&raw);
            if !symbols.is_empty() {
                settings.exchange.symbols = symbols;
            }
        }
        if let Some(timeframe) = lookup("RETRACE_TIMEFRAME") {
            settings.data.timeframe = timeframe;
        }
        if let Some(dir) = lookup("RETRACE_DATA_DIR") {
            settings.data.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RETRACE_OUTPUT_DIR") {
            settings.data.output_dir = PathBuf::from(dir);
        }
        parse_into(&lookup, "RETRACE_LOOKBACK_DAYS", &mut settings.data.lookback_days);
        parse_into(&lookup, "RETRACE_FAST_WINDOW", &mut settings.strategy.fast_window);
        parse_into(&lookup, "RETRACE_SLOW_WINDOW", &mut settings.strategy.slow_window);

        settings
    }

    /// Load settings from a JSON file; missing fields take their defaults
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write settings as pretty-printed JSON
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Split a comma-separated symbol list, dropping blanks
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_into<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(key, value = %raw, "Ignoring unparseable setting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.strategy.fast_window, 10);
        assert_eq!(settings.strategy.slow_window, 25);
        assert_eq!(settings.strategy.ratios, vec![0.236, 0.382, 0.5, 0.618, 0.786]);
        assert_eq!(settings.exchange.symbols.len(), 25);
        assert_eq!(settings.data.timeframe, "1d");
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RETRACE_SYMBOLS", " BTC/USDT, ,ETH/USDT "),
            ("RETRACE_TIMEFRAME", "1h"),
            ("RETRACE_FAST_WINDOW", "5"),
            ("RETRACE_SLOW_WINDOW", "not-a-number"),
            ("RETRACE_DATA_DIR", "/tmp/cache"),
        ]);
        let settings = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.exchange.symbols, vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(settings.data.timeframe, "1h");
        assert_eq!(settings.data.data_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(settings.strategy.fast_window, 5);
        assert_eq!(settings.strategy.slow_window, 25);
    }

    #[test]
    fn test_json_partial_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{"strategy": {"fast_window": 3}}"#).unwrap();

        let settings = Settings::from_json(&path).unwrap();
        assert_eq!(settings.strategy.fast_window, 3);
        assert_eq!(settings.strategy.slow_window, 25);
        assert_eq!(settings.exchange, ExchangeSettings::default());

        settings.to_json(&path).unwrap();
        assert_eq!(Settings::from_json(&path).unwrap(), settings);
    }

    #[test]
    fn test_json_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::from_json(tmp.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(Settings::from_json(&bad), Err(ConfigError::Parse(_))));
    }
}

//! Candle repository: the CSV cache of fetched OHLCV history

use crate::schema::{candle_file_name, CANDLE_HEADERS};
use crate::{io_error, DataStore, StoreError, StoreResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A cached candle row. Timestamp is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRecord {
    #[serde(rename = "Timestamp", deserialize_with = "millis_from_number")]
    pub timestamp: i64,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
}

/// Accepts both integer and float (`1.7e12`) epoch-millisecond columns
fn millis_from_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom(format!("invalid timestamp {value}")));
    }
    Ok(value.round() as i64)
}

/// Repository for cached candle files
pub struct CandleRepository<'a> {
    store: &'a DataStore,
}

impl<'a> CandleRepository<'a> {
    pub fn new(store: &'a DataStore) -> Self {
        Self { store }
    }

    /// Path of the cache file for a symbol/timeframe (may not exist yet)
    pub fn path_for(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.store.data_dir().join(candle_file_name(symbol, timeframe))
    }

    /// Overwrite the cache file for a symbol with the given candles
    pub fn save(
        &self,
        symbol: &str,
        timeframe: &str,
        candles: &[CandleRecord],
    ) -> StoreResult<PathBuf> {
        let path = self.path_for(symbol, timeframe);
        let mut writer = csv::Writer::from_path(&path)?;
        if candles.is_empty() {
            // serialize() emits the header lazily, so write it by hand here
            writer.write_record(CANDLE_HEADERS)?;
        }
        for candle in candles {
            writer.serialize(candle)?;
        }
        writer.flush().map_err(io_error(&path))?;

        info!(symbol, candles = candles.len(), path = %path.display(), "Saved candles");
        Ok(path)
    }

    /// Load every candle from a cache file
    pub fn load(&self, path: &Path) -> StoreResult<Vec<CandleRecord>> {
        let mut reader = csv::Reader::from_path(path)?;
        let candles = reader
            .deserialize()
            .collect::<Result<Vec<CandleRecord>, _>>()?;
        debug!(path = %path.display(), candles = candles.len(), "Loaded candles");
        Ok(candles)
    }

    /// Load only the `Close` column of a cache file
    pub fn load_closes(&self, path: &Path) -> StoreResult<Vec<f64>> {
        let mut reader = csv::Reader::from_path(path)?;
        let close_idx = reader
            .headers()?
            .iter()
            .position(|h| h == "Close")
            .ok_or(StoreError::MissingColumn("Close"))?;

        let mut closes = Vec::new();
        for record in reader.records() {
            let record = record?;
            let raw = record.get(close_idx).ok_or(StoreError::MissingColumn("Close"))?;
            let value = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| StoreError::InvalidValue {
                    column: "Close",
                    value: raw.to_string(),
                })?;
            closes.push(value);
        }
        Ok(closes)
    }

    /// Cache files that exist for the given symbols, keyed by symbol
    pub fn latest_paths(&self, symbols: &[String], timeframe: &str) -> BTreeMap<String, PathBuf> {
        symbols
            .iter()
            .filter_map(|symbol| {
                let path = self.path_for(symbol, timeframe);
                path.exists().then(|| (symbol.clone(), path))
            })
            .collect()
    }
}

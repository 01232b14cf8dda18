//! Output repository: signal feeds, enriched tables and reports

use crate::schema::{level_column, CANDLE_HEADERS};
use crate::{io_error, DataStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// A serialized trade signal: ISO-8601 timestamp, `BUY`/`SELL`, price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub timestamp: String,
    pub action: String,
    pub price: f64,
}

/// One enriched bar: OHLCV plus level prices in header order
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub levels: Vec<f64>,
}

/// Repository for files written to the output directory
pub struct OutputRepository<'a> {
    store: &'a DataStore,
}

impl<'a> OutputRepository<'a> {
    pub fn new(store: &'a DataStore) -> Self {
        Self { store }
    }

    /// Write signals as a pretty-printed JSON array
    pub fn save_signals_json(
        &self,
        file_name: &str,
        signals: &[SignalRecord],
    ) -> StoreResult<PathBuf> {
        let path = self.store.output_dir().join(file_name);
        let json = serde_json::to_string_pretty(signals)?;
        std::fs::write(&path, json).map_err(io_error(&path))?;

        info!(signals = signals.len(), path = %path.display(), "Saved signals");
        Ok(path)
    }

    /// Read back a signals file written by [`Self::save_signals_json`]
    pub fn load_signals_json(&self, file_name: &str) -> StoreResult<Vec<SignalRecord>> {
        let path = self.store.output_dir().join(file_name);
        let text = std::fs::read_to_string(&path).map_err(io_error(&path))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write enriched rows. `ratios` are the formatted ratios, one per
    /// entry of each record's `levels`.
    pub fn save_enriched_csv(
        &self,
        file_name: &str,
        ratios: &[String],
        rows: &[EnrichedRecord],
    ) -> StoreResult<PathBuf> {
        let path = self.store.output_dir().join(file_name);
        let mut writer = csv::Writer::from_path(&path)?;

        let header: Vec<String> = CANDLE_HEADERS
            .iter()
            .map(|h| h.to_string())
            .chain(ratios.iter().map(|r| level_column(r)))
            .collect();
        writer.write_record(&header)?;

        for row in rows {
            let mut fields = vec![
                row.timestamp.to_string(),
                row.open.to_string(),
                row.high.to_string(),
                row.low.to_string(),
                row.close.to_string(),
                row.volume.to_string(),
            ];
            fields.extend(row.levels.iter().map(|p| p.to_string()));
            writer.write_record(&fields)?;
        }
        writer.flush().map_err(io_error(&path))?;

        info!(rows = rows.len(), path = %path.display(), "Saved enriched rows");
        Ok(path)
    }

    /// Write a plain-text report
    pub fn save_report(&self, file_name: &str, text: &str) -> StoreResult<PathBuf> {
        let path = self.store.output_dir().join(file_name);
        std::fs::write(&path, text).map_err(io_error(&path))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(tmp: &tempfile::TempDir) -> DataStore {
        DataStore::open(tmp.path().join("data"), tmp.path().join("out")).unwrap()
    }

    #[test]
    fn test_signals_json_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let repo = OutputRepository::new(&store);

        let records = vec![SignalRecord {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            action: "BUY".to_string(),
            price: 101.25,
        }];
        let path = repo.save_signals_json("signals.json", &records).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value[0]["action"], "BUY");
        assert_eq!(value[0]["price"], 101.25);
        assert_eq!(value[0]["timestamp"], "2024-01-01T00:00:00Z");

        assert_eq!(repo.load_signals_json("signals.json").unwrap(), records);
    }

    #[test]
    fn test_enriched_csv_has_level_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let repo = OutputRepository::new(&store);

        let ratios = vec!["0.236".to_string(), "0.500".to_string()];
        let rows = vec![EnrichedRecord {
            timestamp: 60_000,
            open: 10.0,
            high: 12.0,
            low: 8.0,
            close: 11.0,
            volume: 50.0,
            levels: vec![11.056, 10.0],
        }];
        let path = repo.save_enriched_csv("enriched.csv", &ratios, &rows).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Timestamp,Open,High,Low,Close,Volume,fib_0.236,fib_0.500"
        );
        assert_eq!(lines[1], "60000,10,12,8,11,50,11.056,10");
    }

    #[test]
    fn test_save_report() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let path = OutputRepository::new(&store)
            .save_report("report.txt", "BTC/USDT: rec=hold")
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "BTC/USDT: rec=hold");
    }
}

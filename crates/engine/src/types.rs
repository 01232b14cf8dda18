//! Core data model shared by the indicators, strategy and pipeline

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use persistence::repository::{CandleRecord, EnrichedRecord, SignalRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Build a bar from an epoch-millisecond timestamp. Returns `None` when
    /// the timestamp is out of chrono's range.
    pub fn from_millis(
        millis: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Option<Self> {
        let timestamp = Utc.timestamp_millis_opt(millis).single()?;
        Some(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

impl From<&PriceBar> for CandleRecord {
    fn from(bar: &PriceBar) -> Self {
        Self {
            timestamp: bar.timestamp.timestamp_millis(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

impl TryFrom<&CandleRecord> for PriceBar {
    type Error = anyhow::Error;

    fn try_from(record: &CandleRecord) -> Result<Self, Self::Error> {
        PriceBar::from_millis(
            record.timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )
        .ok_or_else(|| anyhow::anyhow!("timestamp {} out of range", record.timestamp))
    }
}

/// A retracement ratio keyed by its value rounded to three decimals.
///
/// Rounding gives stable keys across calls with floating ratios, so
/// `0.382` and `0.38200000001` address the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ratio(i64);

impl Ratio {
    pub fn new(value: f64) -> Self {
        Self((value * 1000.0).round() as i64)
    }

    pub fn value(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.value())
    }
}

/// A bar with the retracement levels of its trailing window attached
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub bar: PriceBar,
    pub levels: BTreeMap<Ratio, f64>,
}

impl EnrichedRow {
    /// Lowest attached level price, `None` when no levels are attached
    pub fn lowest_level(&self) -> Option<f64> {
        self.levels.values().copied().reduce(f64::min)
    }

    /// Highest attached level price, `None` when no levels are attached
    pub fn highest_level(&self) -> Option<f64> {
        self.levels.values().copied().reduce(f64::max)
    }
}

impl From<&EnrichedRow> for EnrichedRecord {
    fn from(row: &EnrichedRow) -> Self {
        Self {
            timestamp: row.bar.timestamp.timestamp_millis(),
            open: row.bar.open,
            high: row.bar.high,
            low: row.bar.low,
            close: row.bar.close,
            volume: row.bar.volume,
            levels: row.levels.values().copied().collect(),
        }
    }
}

/// Side of a trade signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => f.write_str("BUY"),
            Action::Sell => f.write_str("SELL"),
        }
    }
}

/// A discrete trade signal emitted at a bar's close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub price: f64,
}

impl From<&Signal> for SignalRecord {
    fn from(signal: &Signal) -> Self {
        Self {
            timestamp: signal.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            action: signal.action.to_string(),
            price: signal.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_rounds_to_three_decimals() {
        assert_eq!(Ratio::new(0.382), Ratio::new(0.382_000_1));
        assert_ne!(Ratio::new(0.382), Ratio::new(0.383));
        assert_eq!(Ratio::new(0.5).to_string(), "0.500");
        assert_eq!(Ratio::new(0.236).value(), 0.236);
        assert!(Ratio::new(0.236) < Ratio::new(0.786));
    }

    #[test]
    fn test_signal_serializes_iso_timestamp_and_uppercase_action() {
        let signal = Signal {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap(),
            action: Action::Sell,
            price: 42.5,
        };
        let json = serde_json::to_value(signal).unwrap();
        assert_eq!(json["action"], "SELL");
        assert_eq!(json["price"], 42.5);
        assert_eq!(json["timestamp"], "2024-01-02T03:00:00Z");

        let record = SignalRecord::from(&signal);
        assert_eq!(record.action, "SELL");
        assert_eq!(record.timestamp, "2024-01-02T03:00:00Z");
    }

    #[test]
    fn test_candle_record_conversion() {
        let bar = PriceBar::from_millis(86_400_000, 1.0, 2.0, 0.5, 1.5, 9.0).unwrap();
        let record = CandleRecord::from(&bar);
        assert_eq!(record.timestamp, 86_400_000);
        assert_eq!(PriceBar::try_from(&record).unwrap(), bar);
    }
}

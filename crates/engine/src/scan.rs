//! Whole-series Fibonacci scan
//!
//! Takes a full close-price history, anchors the six-level retracement at its
//! global high and low, and classifies the last close into a recommendation.
//! This is a one-shot end-of-data scan, independent of the per-bar
//! [`crate::strategy::CrossoverStrategy`].

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::fibonacci::{calculate_fibonacci_retracement, level_price, RetracementLevels};

/// Band half-width as a fraction of the high/low range
const TOLERANCE_PCT: f64 = 0.01;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("No prices provided for Fibonacci analysis")]
    EmptyInput,
}

/// Recommendation for the last close of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    WatchForResistance,
    PivotZone,
    PotentialBuy,
    PotentialTakeProfit,
    Hold,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Recommendation::WatchForResistance => "watch for resistance",
            Recommendation::PivotZone => "pivot zone",
            Recommendation::PotentialBuy => "potential buy",
            Recommendation::PotentialTakeProfit => "potential take profit",
            Recommendation::Hold => "hold",
        };
        f.write_str(text)
    }
}

/// Result of scanning one symbol's history
#[derive(Debug, Clone, PartialEq)]
pub struct FibonacciScan {
    pub symbol: String,
    pub last_close: f64,
    pub high: f64,
    pub low: f64,
    pub levels: RetracementLevels,
    pub recommendation: Recommendation,
}

/// Classify a close against the levels of a high/low range.
///
/// Bands are checked in priority order: around 0.382, around 0.5, at or
/// below 0.618, at or above 0.236, otherwise hold.
pub fn recommend(close: f64, high: f64, low: f64) -> Recommendation {
    let tolerance = (high - low) * TOLERANCE_PCT;
    let near = |ratio: f64| {
        let level = level_price(high, low, ratio);
        close >= level - tolerance && close <= level + tolerance
    };

    if near(0.382) {
        Recommendation::WatchForResistance
    } else if near(0.5) {
        Recommendation::PivotZone
    } else if close <= level_price(high, low, 0.618) + tolerance {
        Recommendation::PotentialBuy
    } else if close >= level_price(high, low, 0.236) - tolerance {
        Recommendation::PotentialTakeProfit
    } else {
        Recommendation::Hold
    }
}

/// Scan a close-price history. Fails only on an empty series.
pub fn scan_closes(symbol: &str, closes: &[f64]) -> Result<FibonacciScan, AnalysisError> {
    let last_close = *closes.last().ok_or(AnalysisError::EmptyInput)?;
    let high = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = closes.iter().copied().fold(f64::INFINITY, f64::min);

    let levels = calculate_fibonacci_retracement(high, low);
    let recommendation = recommend(last_close, high, low);

    info!(
        symbol,
        close = last_close,
        high,
        low,
        %recommendation,
        "Fibonacci scan"
    );

    Ok(FibonacciScan {
        symbol: symbol.to_string(),
        last_close,
        high,
        low,
        levels,
        recommendation,
    })
}

/// One line per scanned symbol, or a hint when nothing was scanned
pub fn render_report<'a>(scans: impl IntoIterator<Item = &'a FibonacciScan>) -> String {
    let lines: Vec<String> = scans
        .into_iter()
        .map(|s| {
            format!(
                "{}: close={:.2}, high={:.2}, low={:.2}, rec={}",
                s.symbol, s.last_close, s.high, s.low, s.recommendation
            )
        })
        .collect();

    if lines.is_empty() {
        "No data available. Run sync to download candles first.".to_string()
    } else {
        lines.join("\n")
    }
}

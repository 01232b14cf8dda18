//! Fibonacci retracement levels
//!
//! One operation, [`compute_levels`], turns a high/low pair and a ratio set
//! into level prices. Two presets exist: [`DEFAULT_RATIOS`] for the rolling
//! per-bar form used by the enricher, and [`LEGACY_RATIOS`] for the two-point
//! whole-series form. [`append_levels`] slides a trailing window over a bar
//! sequence and attaches the levels of each window to its last bar.

use std::collections::BTreeMap;

use ta::indicators::{Maximum, Minimum};
use ta::Next;

use crate::types::{EnrichedRow, PriceBar, Ratio};

/// Ratios attached to every bar by the enricher
pub const DEFAULT_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];

/// Six-level two-point preset, anchored at the high (0.0) and low (1.0)
pub const LEGACY_RATIOS: [f64; 6] = [0.0, 0.236, 0.382, 0.5, 0.618, 1.0];

/// Length of the trailing window the enricher takes high/low over
pub const LOOKBACK_BARS: usize = 50;

/// Level prices for one high/low pair
#[derive(Debug, Clone, PartialEq)]
pub struct RetracementLevels {
    pub high: f64,
    pub low: f64,
    pub levels: BTreeMap<Ratio, f64>,
}

impl RetracementLevels {
    /// Price at a ratio, if that ratio was computed
    pub fn price(&self, ratio: f64) -> Option<f64> {
        self.levels.get(&Ratio::new(ratio)).copied()
    }
}

/// Price of a single level: `high - ratio * (high - low)`.
///
/// The anchors are returned as-is so ratio 0 is exactly `high` and ratio 1
/// exactly `low`.
pub fn level_price(high: f64, low: f64, ratio: f64) -> f64 {
    if ratio == 0.0 {
        high
    } else if ratio == 1.0 {
        low
    } else {
        high - ratio * (high - low)
    }
}

/// Compute the level price for every ratio.
///
/// No validation: `high < low` or ratios outside `[0, 1]` go through the
/// same formula. Ratios that round to the same key keep the last price.
pub fn compute_levels(high: f64, low: f64, ratios: &[f64]) -> RetracementLevels {
    let levels = ratios
        .iter()
        .map(|&ratio| (Ratio::new(ratio), level_price(high, low, ratio)))
        .collect();
    RetracementLevels { high, low, levels }
}

/// Two-point form with the fixed six-level [`LEGACY_RATIOS`] preset
pub fn calculate_fibonacci_retracement(high: f64, low: f64) -> RetracementLevels {
    compute_levels(high, low, &LEGACY_RATIOS)
}

/// Attach rolling retracement levels to every bar.
///
/// Bar `i` uses the window `[max(0, i - 49), i]`: the highest high and lowest
/// low over at most [`LOOKBACK_BARS`] bars ending at `i`. Early bars see a
/// shorter window. Output has one row per input bar, in input order.
pub fn append_levels(bars: &[PriceBar], ratios: &[f64]) -> Vec<EnrichedRow> {
    let mut window_high = Maximum::new(LOOKBACK_BARS).expect("Invalid lookback period");
    let mut window_low = Minimum::new(LOOKBACK_BARS).expect("Invalid lookback period");

    bars.iter()
        .map(|bar| {
            let high = window_high.next(bar.high);
            let low = window_low.next(bar.low);
            EnrichedRow {
                bar: *bar,
                levels: compute_levels(high, low, ratios).levels,
            }
        })
        .collect()
}

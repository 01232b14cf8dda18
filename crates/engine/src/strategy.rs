//! Moving-average crossover strategy confirmed by retracement proximity
//!
//! A bar emits BUY when the fast SMA is above the slow SMA and the close sits
//! within 1% above the lowest attached level, or SELL when the fast SMA is
//! below the slow SMA and the close sits within 1% below the highest level.

use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::fibonacci::append_levels;
use crate::types::{Action, EnrichedRow, PriceBar, Signal};

/// Close must be at most this multiple of the lowest level to count as support
const SUPPORT_BAND: f64 = 1.01;
/// Close must be at least this multiple of the highest level to count as resistance
const RESISTANCE_BAND: f64 = 0.99;

/// SMA crossover strategy with Fibonacci confluence
#[derive(Debug, Clone)]
pub struct CrossoverStrategy {
    fast: usize,
    slow: usize,
    ratios: Vec<f64>,
}

impl Default for CrossoverStrategy {
    fn default() -> Self {
        Self::new(&StrategyConfig::default())
    }
}

impl CrossoverStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            fast: config.fast_window,
            slow: config.slow_window,
            ratios: config.ratios.clone(),
        }
    }

    /// Enrich the bars and return every signal, in bar order
    pub fn evaluate(&self, bars: &[PriceBar]) -> Vec<Signal> {
        let enriched = append_levels(bars, &self.ratios);
        self.evaluate_enriched(&enriched)
    }

    /// Run the strategy over rows that already carry their levels
    pub fn evaluate_enriched(&self, rows: &[EnrichedRow]) -> Vec<Signal> {
        let closes: Vec<f64> = rows.iter().map(|row| row.bar.close).collect();

        let signals: Vec<Signal> = rows
            .iter()
            .enumerate()
            .skip(self.slow.saturating_sub(1))
            .filter_map(|(idx, row)| {
                let sma_fast = trailing_mean(&closes, idx, self.fast);
                let sma_slow = trailing_mean(&closes, idx, self.slow);
                let action = classify(row, sma_fast, sma_slow)?;
                debug!(
                    time = %row.bar.timestamp,
                    close = row.bar.close,
                    sma_fast,
                    sma_slow,
                    %action,
                    "Signal"
                );
                Some(Signal {
                    timestamp: row.bar.timestamp,
                    action,
                    price: row.bar.close,
                })
            })
            .collect();

        info!(
            bars = rows.len(),
            signals = signals.len(),
            fast = self.fast,
            slow = self.slow,
            "Generated signals"
        );
        signals
    }
}

/// Decide the action for one row; BUY wins over SELL by evaluation order
fn classify(row: &EnrichedRow, sma_fast: f64, sma_slow: f64) -> Option<Action> {
    let close = row.bar.close;
    let near_support = row
        .lowest_level()
        .is_some_and(|lowest| close <= lowest * SUPPORT_BAND);
    let near_resistance = row
        .highest_level()
        .is_some_and(|highest| close >= highest * RESISTANCE_BAND);

    if sma_fast > sma_slow && near_support {
        Some(Action::Buy)
    } else if sma_fast < sma_slow && near_resistance {
        Some(Action::Sell)
    } else {
        None
    }
}

/// Mean of the `window` values ending at `idx` (inclusive), clamped to the
/// start of the series. Values are summed as offsets from the first one, so
/// a constant window yields exactly that constant.
fn trailing_mean(values: &[f64], idx: usize, window: usize) -> f64 {
    let start = (idx + 1).saturating_sub(window.max(1));
    let slice = &values[start..=idx];
    let base = slice[0];
    let offset: f64 = slice.iter().map(|v| v - base).sum();
    base + offset / slice.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fibonacci::DEFAULT_RATIOS;
    use crate::synthetic::generate_trend;
    use crate::types::Ratio;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                timestamp: start + Duration::hours(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100.0,
            })
            .collect()
    }

    fn strategy(fast: usize, slow: usize) -> CrossoverStrategy {
        CrossoverStrategy::new(&StrategyConfig {
            fast_window: fast,
            slow_window: slow,
            ratios: DEFAULT_RATIOS.to_vec(),
        })
    }

    fn row_with_levels(close: f64, levels: &[(f64, f64)]) -> EnrichedRow {
        let bar = make_bars(&[close])[0];
        EnrichedRow {
            bar,
            levels: levels
                .iter()
                .map(|&(r, p)| (Ratio::new(r), p))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_default_skips_first_24_bars() {
        // Default slow window is 25 bars
        let mut closes: Vec<f64> = (0..20).map(|i| 200.0 - i as f64 * 8.0).collect();
        closes.extend((0..20).map(|i| 45.0 + i as f64 * 2.0));
        let bars = make_bars(&closes);

        let signals = CrossoverStrategy::default().evaluate(&bars);
        assert!(signals.iter().all(|s| s.timestamp >= bars[24].timestamp));
        assert!(CrossoverStrategy::default().evaluate(&bars[..24]).is_empty());
    }

    #[test]
    fn test_strategy_generates_signals_on_trend() {
        let bars = generate_trend(80);
        let signals = strategy(5, 15).evaluate(&bars);
        assert!(signals
            .iter()
            .all(|s| matches!(s.action, Action::Buy | Action::Sell)));
        assert!(signals.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_constant_prices_never_signal() {
        for price in [100.0, 0.1, 12345.678] {
            let bars = make_bars(&vec![price; 120]);
            assert!(strategy(5, 15).evaluate(&bars).is_empty());
        }
    }

    #[test]
    fn test_no_signal_before_slow_window() {
        // Falling then sharply rising: many bars qualify, but none before index 14
        let mut closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64 * 5.0).collect();
        closes.extend((0..30).map(|i| 55.0 + i as f64 * 8.0));
        let bars = make_bars(&closes);

        let signals = strategy(3, 15).evaluate(&bars);
        let first_allowed = bars[14].timestamp;
        assert!(signals.iter().all(|s| s.timestamp >= first_allowed));

        let short = &bars[..14];
        assert!(strategy(3, 15).evaluate(short).is_empty());
    }

    #[test]
    fn test_buy_on_uptrend_near_support() {
        // Long decline then a bounce: the fast SMA turns up while the close is
        // still near the bottom of the 50-bar range.
        let mut closes: Vec<f64> = (0..40).map(|i| 200.0 - i as f64 * 4.0).collect();
        closes.extend([45.0, 47.0, 49.0, 51.0]);
        let bars = make_bars(&closes);

        let signals = strategy(2, 5).evaluate(&bars);
        let buy = signals
            .iter()
            .find(|s| s.action == Action::Buy)
            .expect("expected a BUY after the bounce");
        assert!(buy.timestamp >= bars[40].timestamp);
        assert_eq!(buy.price, bars.iter().find(|b| b.timestamp == buy.timestamp).unwrap().close);
    }

    #[test]
    fn test_sell_on_downturn_near_resistance() {
        let mut closes: Vec<f64> = (0..40).map(|i| 50.0 + i as f64 * 4.0).collect();
        closes.extend([205.0, 203.0, 201.0, 199.0]);
        let bars = make_bars(&closes);

        let signals = strategy(2, 5).evaluate(&bars);
        assert!(signals
            .iter()
            .any(|s| s.action == Action::Sell && s.timestamp >= bars[40].timestamp));
    }

    #[test]
    fn test_classify_is_mutually_exclusive() {
        // Close sits both near support and near resistance (narrow range)
        let row = row_with_levels(100.0, &[(0.236, 100.2), (0.786, 99.8)]);
        assert_eq!(classify(&row, 2.0, 1.0), Some(Action::Buy));
        assert_eq!(classify(&row, 1.0, 2.0), Some(Action::Sell));
        assert_eq!(classify(&row, 1.0, 1.0), None);
    }

    #[test]
    fn test_classify_uses_all_levels() {
        // Only the lowest level matters for support
        let row = row_with_levels(100.0, &[(0.236, 150.0), (0.5, 120.0), (0.786, 99.5)]);
        assert_eq!(classify(&row, 2.0, 1.0), Some(Action::Buy));

        let row = row_with_levels(100.0, &[(0.236, 150.0), (0.786, 98.0)]);
        assert_eq!(classify(&row, 2.0, 1.0), None);
        assert_eq!(classify(&row, 1.0, 2.0), None);
    }

    #[test]
    fn test_trailing_mean() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(trailing_mean(&values, 4, 2), 4.5);
        assert_eq!(trailing_mean(&values, 4, 5), 3.0);
        // window longer than history clamps to the start
        assert_eq!(trailing_mean(&values, 1, 10), 1.5);
    }
}

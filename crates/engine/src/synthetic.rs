//! Synthetic price data for offline runs

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::PriceBar;

/// Parameters of a synthetic hourly trend
#[derive(Debug, Clone)]
pub struct SyntheticTrend {
    pub start: DateTime<Utc>,
    pub start_price: f64,
    /// Price change per bar
    pub drift: f64,
    /// Max absolute noise added to each close; 0 gives a clean trend
    pub volatility: f64,
    pub seed: u64,
}

impl Default for SyntheticTrend {
    fn default() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            start_price: 100.0,
            drift: 0.5,
            volatility: 0.0,
            seed: 42,
        }
    }
}

impl SyntheticTrend {
    /// Generate `steps` consecutive hourly bars
    pub fn generate(&self, steps: usize) -> Vec<PriceBar> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut prev_close = self.start_price;

        (0..steps)
            .map(|i| {
                let noise = if self.volatility > 0.0 {
                    rng.gen_range(-self.volatility..=self.volatility)
                } else {
                    0.0
                };
                let close = self.start_price + self.drift * i as f64 + noise;
                let bar = PriceBar {
                    timestamp: self.start + Duration::hours(i as i64),
                    open: prev_close,
                    high: prev_close.max(close) + 1.0,
                    low: prev_close.min(close) - 1.0,
                    close,
                    volume: 1_000.0 + 10.0 * i as f64,
                };
                prev_close = close;
                bar
            })
            .collect()
    }
}

/// Clean upward trend: start 100, +0.5 per hourly bar
pub fn generate_trend(steps: usize) -> Vec<PriceBar> {
    SyntheticTrend::default().generate(steps)
}

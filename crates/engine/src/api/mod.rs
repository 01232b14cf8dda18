//! Market data sources

pub mod binance;

pub use binance::BinanceClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::PriceBar;

/// Anything that can supply OHLCV history and a latest price
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Bars for `symbol` between `start_ms` and `end_ms`, oldest first
    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PriceBar>>;

    /// Latest traded price for `symbol`
    async fn current_price(&self, symbol: &str) -> Result<f64>;
}

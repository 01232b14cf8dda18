//! Retrace Engine — Fibonacci retracement signals over OHLCV history
//!
//! Provides:
//! - Retracement levels for a high/low pair, with rolling per-bar enrichment
//! - SMA crossover strategy confirmed by retracement support/resistance
//! - Whole-series Fibonacci scan with end-of-data recommendations
//! - Binance public API client and a synthetic price generator
//! - Sync/analyze orchestration over the persistence layer

pub mod api;
pub mod config;
pub mod fibonacci;
pub mod pipeline;
pub mod scan;
pub mod strategy;
pub mod synthetic;
pub mod types;

// Re-exports for convenience
pub use api::{BinanceClient, MarketDataSource};
pub use config::{ConfigError, DataSettings, ExchangeSettings, Settings, StrategyConfig};
pub use fibonacci::{
    append_levels, calculate_fibonacci_retracement, compute_levels, RetracementLevels,
    DEFAULT_RATIOS, LEGACY_RATIOS, LOOKBACK_BARS,
};
pub use pipeline::{
    analyze_latest, describe_architecture, fetch_prices, generate_signals, run_offline_demo,
    sync_all, SymbolSignals, SyncOutcome,
};
pub use scan::{render_report, scan_closes, AnalysisError, FibonacciScan, Recommendation};
pub use strategy::CrossoverStrategy;
pub use synthetic::{generate_trend, SyntheticTrend};
pub use types::*;

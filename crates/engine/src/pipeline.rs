//! High-level orchestration: sync candles, scan them, generate signals
//!
//! Network work fans out per symbol and is collected before any analysis, so
//! the indicators only ever see complete, ordered histories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use persistence::repository::{
    CandleRecord, CandleRepository, EnrichedRecord, OutputRepository, SignalRecord,
};
use persistence::schema::SYNTHETIC_SIGNALS_FILE;
use persistence::DataStore;
use tracing::{info, warn};

use crate::api::MarketDataSource;
use crate::config::Settings;
use crate::fibonacci::append_levels;
use crate::scan::{scan_closes, FibonacciScan};
use crate::strategy::CrossoverStrategy;
use crate::synthetic::generate_trend;
use crate::types::{PriceBar, Ratio, Signal};

/// Outcome of syncing one symbol: the cache file, or `None` if nothing was
/// saved (fetch failed or the exchange returned no candles)
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub symbol: String,
    pub path: Option<PathBuf>,
    pub bars: usize,
}

/// Signals produced for one cached symbol
#[derive(Debug, Clone)]
pub struct SymbolSignals {
    pub symbol: String,
    pub bars: usize,
    pub signals: Vec<Signal>,
    pub signals_path: PathBuf,
    pub enriched_path: PathBuf,
}

/// `[now - days, now]` in epoch milliseconds. Fails when the start falls
/// outside the representable date range.
pub fn history_window(lookback_days: u32, now: DateTime<Utc>) -> Result<(i64, i64)> {
    let start = now
        .checked_sub_signed(Duration::days(i64::from(lookback_days)))
        .ok_or_else(|| anyhow::anyhow!("Lookback of {lookback_days} days is out of range"))?;
    Ok((start.timestamp_millis(), now.timestamp_millis()))
}

/// Sort by timestamp and drop repeated timestamps, keeping the first bar
pub fn normalize_bars(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|bar| bar.timestamp);
    bars.dedup_by_key(|bar| bar.timestamp);
    bars
}

/// Fetch one symbol's history and write it to the candle cache
pub async fn sync_symbol<S: MarketDataSource + ?Sized>(
    source: &S,
    store: &DataStore,
    symbol: &str,
    timeframe: &str,
    window: (i64, i64),
) -> Result<SyncOutcome> {
    info!(symbol, timeframe, "Syncing OHLCV data");

    let bars = source
        .fetch_bars(symbol, timeframe, window.0, window.1)
        .await
        .with_context(|| format!("Failed to fetch history for {symbol}"))?;
    let bars = normalize_bars(bars);

    if bars.is_empty() {
        warn!(symbol, "No OHLCV data returned");
        return Ok(SyncOutcome {
            symbol: symbol.to_string(),
            path: None,
            bars: 0,
        });
    }

    let records: Vec<CandleRecord> = bars.iter().map(CandleRecord::from).collect();
    let path = CandleRepository::new(store).save(symbol, timeframe, &records)?;

    Ok(SyncOutcome {
        symbol: symbol.to_string(),
        path: Some(path),
        bars: bars.len(),
    })
}

/// Sync every configured symbol concurrently. A failing symbol is logged and
/// reported without a path; the others are unaffected. Only an invalid
/// history window fails the whole sync.
pub async fn sync_all<S: MarketDataSource + ?Sized>(
    source: &S,
    settings: &Settings,
    store: &DataStore,
) -> Result<Vec<SyncOutcome>> {
    let window = history_window(settings.data.lookback_days, Utc::now())?;
    let timeframe = settings.data.timeframe.as_str();

    info!(
        symbols = settings.exchange.symbols.len(),
        timeframe,
        days = settings.data.lookback_days,
        "Starting sync"
    );

    let tasks = settings.exchange.symbols.iter().map(|symbol| async move {
        match sync_symbol(source, store, symbol, timeframe, window).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Sync failed, skipping");
                SyncOutcome {
                    symbol: symbol.clone(),
                    path: None,
                    bars: 0,
                }
            }
        }
    });

    let outcomes = join_all(tasks).await;
    let saved = outcomes.iter().filter(|o| o.path.is_some()).count();
    info!(saved, total = outcomes.len(), "Sync complete");
    Ok(outcomes)
}

/// Latest price of every symbol, fetched concurrently; `None` on failure
pub async fn fetch_prices<S: MarketDataSource + ?Sized>(
    source: &S,
    symbols: &[String],
) -> Vec<(String, Option<f64>)> {
    let tasks = symbols.iter().map(|symbol| async move {
        match source.current_price(symbol).await {
            Ok(price) => (symbol.clone(), Some(price)),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Error getting current price");
                (symbol.clone(), None)
            }
        }
    });
    join_all(tasks).await
}

/// Whole-series scan of every configured symbol that has cached data.
/// Unreadable or empty cache files are logged and skipped.
pub fn analyze_latest(settings: &Settings, store: &DataStore) -> Vec<FibonacciScan> {
    let repo = CandleRepository::new(store);
    let paths = repo.latest_paths(&settings.exchange.symbols, &settings.data.timeframe);

    let mut scans = Vec::with_capacity(paths.len());
    for (symbol, path) in &paths {
        let closes = match repo.load_closes(path) {
            Ok(closes) => closes,
            Err(e) => {
                warn!(symbol = %symbol, path = %path.display(), error = %e, "Unreadable cache file, skipping");
                continue;
            }
        };
        match scan_closes(symbol, &closes) {
            Ok(scan) => scans.push(scan),
            Err(e) => warn!(symbol = %symbol, error = %e, "Scan failed, skipping"),
        }
    }
    scans
}

/// Formatted ratio labels, in the order enriched rows store their levels
pub fn level_headers(ratios: &[f64]) -> Vec<String> {
    ratios
        .iter()
        .map(|&r| Ratio::new(r))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|r| r.to_string())
        .collect()
}

/// Run the crossover strategy over every cached symbol and export the
/// enriched rows and signals of each. Unreadable cache files are logged and
/// skipped; failing to write an export is an error.
pub fn generate_signals(settings: &Settings, store: &DataStore) -> Result<Vec<SymbolSignals>> {
    let candles = CandleRepository::new(store);
    let outputs = OutputRepository::new(store);
    let strategy = CrossoverStrategy::new(&settings.strategy);
    let headers = level_headers(&settings.strategy.ratios);
    let timeframe = &settings.data.timeframe;

    let mut results = Vec::new();
    for (symbol, path) in candles.latest_paths(&settings.exchange.symbols, timeframe) {
        let bars = match load_bars(&candles, &path) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Unreadable cache file, skipping");
                continue;
            }
        };

        let enriched = append_levels(&bars, &settings.strategy.ratios);
        let signals = strategy.evaluate_enriched(&enriched);

        let stem = format!("{}_{}", symbol.replace('/', "_"), timeframe);
        let enriched_records: Vec<EnrichedRecord> =
            enriched.iter().map(EnrichedRecord::from).collect();
        let enriched_path =
            outputs.save_enriched_csv(&format!("{stem}_enriched.csv"), &headers, &enriched_records)?;
        let signal_records: Vec<SignalRecord> = signals.iter().map(SignalRecord::from).collect();
        let signals_path = outputs.save_signals_json(&format!("{stem}_signals.json"), &signal_records)?;

        info!(symbol = %symbol, bars = bars.len(), signals = signals.len(), "Signals generated");
        results.push(SymbolSignals {
            symbol,
            bars: bars.len(),
            signals,
            signals_path,
            enriched_path,
        });
    }
    Ok(results)
}

fn load_bars(candles: &CandleRepository<'_>, path: &Path) -> Result<Vec<PriceBar>> {
    candles
        .load(path)?
        .iter()
        .map(PriceBar::try_from)
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Invalid candle in {}", path.display()))
}

/// Generate a synthetic trend, run the strategy, and save the signals as JSON
pub fn run_offline_demo(settings: &Settings, store: &DataStore, steps: usize) -> Result<Vec<Signal>> {
    let bars = generate_trend(steps);
    let signals = CrossoverStrategy::new(&settings.strategy).evaluate(&bars);

    let records: Vec<SignalRecord> = signals.iter().map(SignalRecord::from).collect();
    let path = OutputRepository::new(store).save_signals_json(SYNTHETIC_SIGNALS_FILE, &records)?;

    info!(signals = signals.len(), path = %path.display(), "Demo complete");
    Ok(signals)
}

/// Human-readable summary of how the toolkit is layered
pub fn describe_architecture() -> &'static str {
    "Retrace is organized into layers: data acquisition (Binance public REST \
     with an offline synthetic generator), a CSV candle cache, feature \
     engineering (rolling Fibonacci retracement levels), strategy logic (SMA \
     crossovers confirmed by retracement support/resistance), and a one-shot \
     whole-series Fibonacci scan for end-of-data recommendations."
}

//! Retrace — Fibonacci retracement scanner and signal generator
//!
//! Usage:
//!   retrace sync --symbols BTC/USDT,ETH/USDT   — Download and cache candles
//!   retrace analyze                            — Whole-series scan of cached data
//!   retrace signals --fast 10 --slow 25        — Crossover signals for cached data
//!   retrace demo                               — Offline synthetic run

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine::config::parse_symbols;
use engine::{
    analyze_latest, describe_architecture, fetch_prices, generate_signals, render_report,
    run_offline_demo, sync_all, BinanceClient, Settings,
};
use persistence::repository::OutputRepository;
use persistence::DataStore;
use tracing::info;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "retrace")]
#[command(about = "Fibonacci retracement scanner and signal generator", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON settings file (defaults to RETRACE_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download OHLCV history for every symbol and cache it as CSV
    Sync {
        /// Symbols to sync (comma-separated, e.g. BTC/USDT,ETH/USDT)
        #[arg(long)]
        symbols: Option<String>,
        /// Candle interval (e.g. 1h, 1d)
        #[arg(long)]
        timeframe: Option<String>,
        /// Days of history to download
        #[arg(long)]
        days: Option<u32>,
    },
    /// Whole-series Fibonacci scan of the cached data
    Analyze {
        /// Also write the report to this file name in the output directory
        #[arg(long)]
        export: Option<String>,
    },
    /// Crossover signals for the cached data, with enriched CSV exports
    Signals {
        /// Symbols to process (comma-separated)
        #[arg(long)]
        symbols: Option<String>,
        /// Fast SMA window
        #[arg(long)]
        fast: Option<usize>,
        /// Slow SMA window
        #[arg(long)]
        slow: Option<usize>,
    },
    /// Sync, then print the whole-series scan
    Run,
    /// Print the latest price of every symbol
    Prices {
        /// Symbols to query (comma-separated)
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Run the strategy on a synthetic trend (no network)
    Demo {
        /// Number of synthetic bars
        #[arg(long, default_value_t = 200)]
        steps: usize,
    },
    /// Print the architecture summary
    Describe,
    /// Write the effective settings to a JSON file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,persistence=debug,retrace=debug")
    } else {
        EnvFilter::new("info,engine=info,persistence=info,retrace=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn load_settings(config: Option<&PathBuf>) -> anyhow::Result<Settings> {
    match config {
        Some(path) => Ok(Settings::from_json(path)?),
        None => Ok(Settings::from_env()),
    }
}

fn open_store(settings: &Settings) -> anyhow::Result<DataStore> {
    Ok(DataStore::open(
        &settings.data.data_dir,
        &settings.data.output_dir,
    )?)
}

fn override_symbols(settings: &mut Settings, symbols: Option<String>) {
    if let Some(raw) = symbols {
        let parsed = parse_symbols(&raw);
        if !parsed.is_empty() {
            settings.exchange.symbols = parsed;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let mut settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Commands::Sync {
            symbols,
            timeframe,
            days,
        } => {
            override_symbols(&mut settings, symbols);
            if let Some(timeframe) = timeframe {
                settings.data.timeframe = timeframe;
            }
            if let Some(days) = days {
                settings.data.lookback_days = days;
            }
            cmd_sync(&settings).await?;
        }
        Commands::Analyze { export } => {
            cmd_analyze(&settings, export.as_deref())?;
        }
        Commands::Signals {
            symbols,
            fast,
            slow,
        } => {
            override_symbols(&mut settings, symbols);
            if let Some(fast) = fast {
                settings.strategy.fast_window = fast;
            }
            if let Some(slow) = slow {
                settings.strategy.slow_window = slow;
            }
            cmd_signals(&settings)?;
        }
        Commands::Run => {
            info!("Starting Retrace v{} with {} symbols", APP_VERSION, settings.exchange.symbols.len());
            cmd_sync(&settings).await?;
            println!("Retrace Fibonacci scan");
            cmd_analyze(&settings, None)?;
        }
        Commands::Prices { symbols } => {
            override_symbols(&mut settings, symbols);
            cmd_prices(&settings).await?;
        }
        Commands::Demo { steps } => {
            let store = open_store(&settings)?;
            let signals = run_offline_demo(&settings, &store, steps)?;
            info!("Demo complete with {} signals", signals.len());
        }
        Commands::Describe => {
            println!("{}", describe_architecture());
        }
        Commands::InitConfig { path } => {
            settings.to_json(&path)?;
            println!("Settings written to {}", path.display());
        }
    }

    Ok(())
}

async fn cmd_sync(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let client = BinanceClient::with_base_url(&settings.exchange.base_url)?;

    let outcomes = sync_all(&client, settings, &store).await?;
    for outcome in &outcomes {
        match &outcome.path {
            Some(path) => println!(
                "  {:<12} {:>6} candles -> {}",
                outcome.symbol,
                outcome.bars,
                path.display()
            ),
            None => println!("  {:<12} skipped", outcome.symbol),
        }
    }
    Ok(())
}

fn cmd_analyze(settings: &Settings, export: Option<&str>) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let scans = analyze_latest(settings, &store);
    let report = render_report(&scans);
    println!("{}", report);

    if let Some(file_name) = export {
        let path = OutputRepository::new(&store).save_report(file_name, &report)?;
        println!("\nReport exported to {}", path.display());
    }
    Ok(())
}

fn cmd_signals(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let results = generate_signals(settings, &store)?;
    if results.is_empty() {
        println!("No data available. Run sync to download candles first.");
        return Ok(());
    }

    println!(
        "  {:<12} {:>6} {:>5} {:>5}  {}",
        "Symbol", "Bars", "Buy", "Sell", "Signals file"
    );
    println!("  {}", "-".repeat(60));
    for r in &results {
        let buys = r
            .signals
            .iter()
            .filter(|s| s.action == engine::Action::Buy)
            .count();
        println!(
            "  {:<12} {:>6} {:>5} {:>5}  {}",
            r.symbol,
            r.bars,
            buys,
            r.signals.len() - buys,
            r.signals_path.display()
        );
    }
    Ok(())
}

async fn cmd_prices(settings: &Settings) -> anyhow::Result<()> {
    let client = BinanceClient::with_base_url(&settings.exchange.base_url)?;
    for (symbol, price) in fetch_prices(&client, &settings.exchange.symbols).await {
        match price {
            Some(price) => println!("  {:<12} {:>14.6}", symbol, price),
            None => println!("  {:<12} {:>14}", symbol, "n/a"),
        }
    }
    Ok(())
}

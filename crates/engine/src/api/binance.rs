//! Binance public API client for market data (no authentication required)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::MarketDataSource;
use crate::config::DEFAULT_BASE_URL;
use crate::types::PriceBar;

const MAX_KLINES_PER_REQUEST: u32 = 1000;
const PAGE_DELAY_MS: u64 = 100;

/// Binance public market data client
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

/// Raw kline data from Binance API (array of arrays)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base
    String, // 10: Taker buy quote
    String, // 11: Ignore
);

/// Binance ticker price response
#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// Exchange symbol for a `BASE/QUOTE` pair (`BTC/USDT` -> `BTCUSDT`)
pub fn exchange_symbol(symbol: &str) -> String {
    symbol.replace('/', "").to_uppercase()
}

impl BinanceClient {
    /// Create a client against the default public endpoint
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against another base URL (testnet, proxy)
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one page of klines. Returns the bars and the close time of the
    /// last one, used to advance pagination.
    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<(Vec<PriceBar>, Option<i64>)> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&startTime={}&endTime={}&limit={}",
            self.base_url,
            exchange_symbol(symbol),
            interval,
            start_time,
            end_time,
            MAX_KLINES_PER_REQUEST
        );

        debug!(symbol, interval, "Fetching klines from Binance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let body = response.text().await?;
        parse_klines(&body)
    }

    /// Fetch klines with automatic pagination for ranges > 1000 bars
    pub async fn get_klines_paginated(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<PriceBar>> {
        info!(symbol, interval, "Fetching paginated klines from Binance");

        let bars = paginate(
            start_time,
            end_time,
            Duration::from_millis(PAGE_DELAY_MS),
            move |page_start| self.get_klines(symbol, interval, page_start, end_time),
        )
        .await?;

        info!(symbol, total = bars.len(), "Paginated kline fetch complete");
        Ok(bars)
    }

    /// Get current price for a symbol
    pub async fn get_price(&self, symbol: &str) -> Result<f64> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url,
            exchange_symbol(symbol)
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let ticker: TickerPrice = response.json().await?;
        let price = ticker
            .price
            .parse::<f64>()
            .with_context(|| format!("Invalid price {:?} for {}", ticker.price, symbol))?;
        Ok(price)
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PriceBar>> {
        self.get_klines_paginated(symbol, timeframe, start_ms, end_ms)
            .await
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        self.get_price(symbol).await
    }
}

/// Drive a page fetcher from `start_time` until `end_time` is reached or a
/// page comes back empty. Each page returns its bars and the close time of
/// its last kline; the next page starts one millisecond after that.
async fn paginate<F, Fut>(
    start_time: i64,
    end_time: i64,
    delay: Duration,
    mut fetch_page: F,
) -> Result<Vec<PriceBar>>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<(Vec<PriceBar>, Option<i64>)>>,
{
    let mut all_bars = Vec::new();
    let mut current_start = start_time;

    while current_start < end_time {
        let (bars, last_close_time) = fetch_page(current_start).await?;

        let Some(last_close_time) = last_close_time else {
            break;
        };
        all_bars.extend(bars);
        current_start = last_close_time + 1;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(all_bars)
}

/// Decode a klines response body. Rows with unparseable numbers are skipped.
fn parse_klines(body: &str) -> Result<(Vec<PriceBar>, Option<i64>)> {
    let raw_klines: Vec<RawKline> =
        serde_json::from_str(body).context("Unexpected klines payload")?;
    let last_close_time = raw_klines.last().map(|k| k.6);

    let bars: Vec<PriceBar> = raw_klines
        .into_iter()
        .filter_map(|raw| {
            PriceBar::from_millis(
                raw.0,
                raw.1.parse().ok()?,
                raw.2.parse().ok()?,
                raw.3.parse().ok()?,
                raw.4.parse().ok()?,
                raw.5.parse().ok()?,
            )
        })
        .collect();

    debug!(count = bars.len(), "Decoded klines");
    Ok((bars, last_close_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"[
        [1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100",
         "148976.11427815", 1499644799999, "2434.19055334", 308, "1756.87402397",
         "28.46694368", "0"],
        [1499644800000, "0.01577100", "0.02000000", "0.01500000", "bad",
         "10.0", 1500249599999, "1.0", 3, "1.0", "1.0", "0"]
    ]"#;

    #[test]
    fn test_parse_klines_skips_bad_rows() {
        let (bars, last_close) = parse_klines(BODY).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp.timestamp_millis(), 1_499_040_000_000);
        assert_eq!(bars[0].high, 0.8);
        assert_eq!(bars[0].close, 0.015771);
        assert_eq!(last_close, Some(1_500_249_599_999));
    }

    #[test]
    fn test_parse_empty_page() {
        let (bars, last_close) = parse_klines("[]").unwrap();
        assert!(bars.is_empty());
        assert_eq!(last_close, None);
        assert!(parse_klines(r#"{"code": -1121}"#).is_err());
    }

    fn hourly_page(first_hour: i64, count: i64) -> (Vec<PriceBar>, Option<i64>) {
        const HOUR: i64 = 3_600_000;
        let bars: Vec<PriceBar> = (first_hour..first_hour + count)
            .map(|h| PriceBar::from_millis(h * HOUR, 1.0, 2.0, 0.5, 1.5, 10.0).unwrap())
            .collect();
        let last_close = (count > 0).then(|| (first_hour + count) * HOUR - 1);
        (bars, last_close)
    }

    #[tokio::test]
    async fn test_paginate_advances_past_last_close() {
        const HOUR: i64 = 3_600_000;
        let mut starts = Vec::new();
        let bars = paginate(0, 10 * HOUR, Duration::ZERO, |start| {
            starts.push(start);
            // three bars per page, truncated at the end of the range
            let first = start / HOUR;
            let count = (10 - first).clamp(0, 3);
            async move { Ok(hourly_page(first, count)) }
        })
        .await
        .unwrap();

        assert_eq!(starts, vec![0, 3 * HOUR, 6 * HOUR, 9 * HOUR]);
        assert_eq!(bars.len(), 10);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn test_paginate_stops_on_empty_page() {
        let mut calls = 0;
        let bars = paginate(0, i64::MAX, Duration::ZERO, |start| {
            calls += 1;
            let page = if start == 0 { hourly_page(0, 2) } else { hourly_page(0, 0) };
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(bars.len(), 2);
    }

    #[tokio::test]
    async fn test_paginate_propagates_page_errors() {
        let result = paginate(0, 100, Duration::ZERO, |_| async {
            Err::<(Vec<PriceBar>, Option<i64>), _>(anyhow::anyhow!("Binance API error 429"))
        })
        .await;
        assert!(result.is_err());

        // an empty range never fetches
        let bars = paginate(100, 100, Duration::ZERO, |_| async {
            Err::<(Vec<PriceBar>, Option<i64>), _>(anyhow::anyhow!("unreachable"))
        })
        .await
        .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_exchange_symbol() {
        assert_eq!(exchange_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(exchange_symbol("ethusdt"), "ETHUSDT");
    }
}

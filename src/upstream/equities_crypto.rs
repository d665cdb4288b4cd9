// =============================================================================
// Equities/crypto upstream adapter
// =============================================================================
//
// Grounded on `original_source/raspberry-pi-hub/alpaca_client.py`. Stocks are
// snapshotted twice per batch (a live `iex` leg and a delayed `delayed_sip`
// baseline leg); symbols still missing after that fall back to a
// latest-quote + recent-daily-bars pair. Crypto uses one latest-quote call
// and one multi-day daily-bar call to recover `open`/`prev_close` across
// weekends.
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::warn;

use crate::model::{BarPoint, QuotePoint, RawSnapshot, TradePoint};
use crate::types::AssetClass;

const STOCKS_BASE_URL: &str = "https://data.alpaca.markets/v2/stocks";
const CRYPTO_BASE_URL: &str = "https://data.alpaca.markets/v1beta3/crypto/us";

pub struct EquitiesCryptoClient {
    client: reqwest::Client,
    rate_limit_delay: Duration,
}

impl EquitiesCryptoClient {
    pub fn new(timeout: Duration, rate_limit_delay: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build equities/crypto reqwest client");
        Self { client, rate_limit_delay }
    }

    fn auth_headers(key: &str, secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(key) {
            headers.insert("APCA-API-KEY-ID", v);
        }
        if let Ok(v) = HeaderValue::from_str(secret) {
            headers.insert("APCA-API-SECRET-KEY", v);
        }
        headers
    }

    /// Fetch a map of `symbol -> RawSnapshot` for `symbols` of `class`.
    /// Missing symbols are simply absent; upstream HTTP errors drop only the
    /// affected batch and are logged at `warn!` (spec §4.B — adapters never
    /// throw across component boundaries).
    pub async fn fetch(
        &self,
        class: AssetClass,
        symbols: &[String],
        credential: Option<(String, String)>,
    ) -> HashMap<String, RawSnapshot> {
        let Some((key, secret)) = credential else {
            warn!(%class, "no credential on file, skipping equities/crypto class");
            return HashMap::new();
        };
        if symbols.is_empty() {
            return HashMap::new();
        }
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        let headers = Self::auth_headers(&key, &secret);

        match class {
            AssetClass::Stocks => self.fetch_stocks(&symbols, headers).await,
            AssetClass::Crypto => self.fetch_crypto(&symbols, headers).await,
            AssetClass::Forex => HashMap::new(),
        }
    }

    async fn fetch_stocks(&self, symbols: &[String], headers: HeaderMap) -> HashMap<String, RawSnapshot> {
        let live = self.fetch_stock_snapshots(symbols, "iex", &headers).await;
        tokio::time::sleep(self.rate_limit_delay).await;
        let baseline = self.fetch_stock_snapshots(symbols, "delayed_sip", &headers).await;

        let mut results: HashMap<String, RawSnapshot> = HashMap::new();
        for symbol in symbols {
            let live_snap = live.get(symbol);
            let baseline_snap = baseline.get(symbol).or(live_snap);
            if let (None, None) = (live_snap, baseline_snap) {
                continue;
            }
            results.insert(symbol.clone(), merge_stock_snapshot(live_snap, baseline_snap));
        }

        let missing: Vec<String> = symbols.iter().filter(|s| !results.contains_key(*s)).cloned().collect();
        if !missing.is_empty() {
            tokio::time::sleep(self.rate_limit_delay).await;
            let fallback = self.fetch_stock_quote_and_bars_fallback(&missing, &headers).await;
            results.extend(fallback);
        }
        results
    }

    async fn fetch_stock_snapshots(
        &self,
        symbols: &[String],
        feed: &str,
        headers: &HeaderMap,
    ) -> HashMap<String, AlpacaStockSnapshot> {
        let url = format!("{STOCKS_BASE_URL}/snapshots");
        let resp = self
            .client
            .get(&url)
            .headers(headers.clone())
            .query(&[("symbols", symbols.join(",")), ("feed", feed.to_string())])
            .send()
            .await;

        let resp = match resp {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = %r.status(), feed, "stock snapshots request failed");
                return HashMap::new();
            }
            Err(e) => {
                warn!(error = %e, feed, "stock snapshots request errored");
                return HashMap::new();
            }
        };

        match resp.json::<AlpacaSnapshotsResponse>().await {
            Ok(body) => body.snapshots,
            Err(e) => {
                warn!(error = %e, feed, "failed to decode stock snapshots response");
                HashMap::new()
            }
        }
    }

    async fn fetch_stock_quote_and_bars_fallback(
        &self,
        symbols: &[String],
        headers: &HeaderMap,
    ) -> HashMap<String, RawSnapshot> {
        let daily_start = (Utc::now() - chrono::Duration::days(10)).to_rfc3339();

        let bars_resp = self
            .client
            .get(format!("{STOCKS_BASE_URL}/bars"))
            .headers(headers.clone())
            .query(&[
                ("symbols", symbols.join(",")),
                ("timeframe", "1Day".to_string()),
                ("start", daily_start),
                ("limit", "5".to_string()),
                ("feed", "iex".to_string()),
            ])
            .send()
            .await;

        let daily_bars: HashMap<String, Vec<AlpacaBar>> = match bars_resp {
            Ok(r) if r.status().is_success() => r
                .json::<AlpacaBarsResponse>()
                .await
                .map(|b| b.bars)
                .unwrap_or_default(),
            Ok(r) => {
                warn!(status = %r.status(), "stock daily-bars fallback failed");
                HashMap::new()
            }
            Err(e) => {
                warn!(error = %e, "stock daily-bars fallback errored");
                HashMap::new()
            }
        };

        let quotes_resp = self
            .client
            .get(format!("{STOCKS_BASE_URL}/quotes/latest"))
            .headers(headers.clone())
            .query(&[("symbols", symbols.join(",")), ("feed", "iex".to_string())])
            .send()
            .await;

        let quotes: HashMap<String, AlpacaQuote> = match quotes_resp {
            Ok(r) if r.status().is_success() => r
                .json::<AlpacaQuotesResponse>()
                .await
                .map(|q| q.quotes)
                .unwrap_or_default(),
            Ok(r) => {
                warn!(status = %r.status(), "stock latest-quotes fallback failed");
                HashMap::new()
            }
            Err(e) => {
                warn!(error = %e, "stock latest-quotes fallback errored");
                HashMap::new()
            }
        };

        let mut results = HashMap::new();
        for symbol in symbols {
            let mut bars = daily_bars.get(symbol).cloned().unwrap_or_default();
            bars.sort_by_key(|b| b.timestamp);
            let current = bars.last();
            let previous = if bars.len() > 1 { bars.get(bars.len() - 2) } else { None };
            let quote = quotes.get(symbol);

            if current.is_none() && quote.is_none() {
                continue;
            }

            let snapshot = RawSnapshot {
                trade: None,
                quote: quote.map(|q| QuotePoint {
                    bid: Some(q.bid_price),
                    ask: Some(q.ask_price),
                    timestamp: Some(q.timestamp),
                }),
                minute_bar: None,
                daily_bar: current.map(|b| BarPoint {
                    open: Some(b.open),
                    close: Some(b.close),
                    timestamp: Some(b.timestamp),
                }),
                prev_daily: previous.map(|b| BarPoint {
                    open: Some(b.open),
                    close: Some(b.close),
                    timestamp: Some(b.timestamp),
                }),
            };
            results.insert(symbol.clone(), snapshot);
        }
        results
    }

    async fn fetch_crypto(&self, symbols: &[String], headers: HeaderMap) -> HashMap<String, RawSnapshot> {
        let daily_start = (Utc::now() - chrono::Duration::days(10)).to_rfc3339();

        let daily_resp = self
            .client
            .get(format!("{CRYPTO_BASE_URL}/bars"))
            .headers(headers.clone())
            .query(&[
                ("symbols", symbols.join(",")),
                ("timeframe", "1Day".to_string()),
                ("start", daily_start),
                ("limit", "5".to_string()),
            ])
            .send()
            .await;

        let daily_bars: HashMap<String, Vec<AlpacaBar>> = match daily_resp {
            Ok(r) if r.status().is_success() => r
                .json::<AlpacaBarsResponse>()
                .await
                .map(|b| b.bars)
                .unwrap_or_default(),
            Ok(r) => {
                warn!(status = %r.status(), "crypto daily bars request failed");
                HashMap::new()
            }
            Err(e) => {
                warn!(error = %e, "crypto daily bars request errored");
                HashMap::new()
            }
        };

        tokio::time::sleep(self.rate_limit_delay).await;

        let quotes_resp = self
            .client
            .get(format!("{CRYPTO_BASE_URL}/latest/quotes"))
            .headers(headers.clone())
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await;

        let quotes: HashMap<String, AlpacaQuote> = match quotes_resp {
            Ok(r) if r.status().is_success() => r
                .json::<AlpacaQuotesResponse>()
                .await
                .map(|q| q.quotes)
                .unwrap_or_default(),
            Ok(r) => {
                warn!(status = %r.status(), "crypto latest quotes request failed");
                HashMap::new()
            }
            Err(e) => {
                warn!(error = %e, "crypto latest quotes request errored");
                HashMap::new()
            }
        };

        let mut results = HashMap::new();
        for symbol in symbols {
            let mut bars = daily_bars.get(symbol).cloned().unwrap_or_default();
            bars.sort_by_key(|b| b.timestamp);
            let current = bars.last();
            let previous = if bars.len() > 1 { bars.get(bars.len() - 2) } else { None };
            let quote = quotes.get(symbol);

            if current.is_none() && quote.is_none() {
                continue;
            }

            let snapshot = RawSnapshot {
                trade: None,
                quote: quote.map(|q| QuotePoint {
                    bid: Some(q.bid_price),
                    ask: Some(q.ask_price),
                    timestamp: Some(q.timestamp),
                }),
                minute_bar: None,
                daily_bar: current.map(|b| BarPoint {
                    open: Some(b.open),
                    close: Some(b.close),
                    timestamp: Some(b.timestamp),
                }),
                prev_daily: previous.map(|b| BarPoint {
                    open: Some(b.open),
                    close: Some(b.close),
                    timestamp: Some(b.timestamp),
                }),
            };
            results.insert(symbol.clone(), snapshot);
        }
        results
    }
}

fn merge_stock_snapshot(
    live: Option<&AlpacaStockSnapshot>,
    baseline: Option<&AlpacaStockSnapshot>,
) -> RawSnapshot {
    let live = live.or(baseline);
    RawSnapshot {
        trade: live.and_then(|s| s.latest_trade.as_ref()).map(|t| TradePoint {
            price: Some(t.price),
            timestamp: Some(t.timestamp),
        }),
        quote: live.and_then(|s| s.latest_quote.as_ref()).map(|q| QuotePoint {
            bid: Some(q.bid_price),
            ask: Some(q.ask_price),
            timestamp: Some(q.timestamp),
        }),
        minute_bar: live.and_then(|s| s.minute_bar.as_ref()).map(|b| BarPoint {
            open: Some(b.open),
            close: Some(b.close),
            timestamp: Some(b.timestamp),
        }),
        daily_bar: baseline.and_then(|s| s.daily_bar.as_ref()).map(|b| BarPoint {
            open: Some(b.open),
            close: Some(b.close),
            timestamp: Some(b.timestamp),
        }),
        prev_daily: baseline.and_then(|s| s.prev_daily_bar.as_ref()).map(|b| BarPoint {
            open: Some(b.open),
            close: Some(b.close),
            timestamp: Some(b.timestamp),
        }),
    }
}

// ── Provider wire shapes ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct AlpacaTrade {
    #[serde(rename = "p")]
    price: f64,
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct AlpacaQuote {
    #[serde(rename = "bp")]
    bid_price: f64,
    #[serde(rename = "ap")]
    ask_price: f64,
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct AlpacaBar {
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct AlpacaStockSnapshot {
    #[serde(rename = "latestTrade")]
    latest_trade: Option<AlpacaTrade>,
    #[serde(rename = "latestQuote")]
    latest_quote: Option<AlpacaQuote>,
    #[serde(rename = "minuteBar")]
    minute_bar: Option<AlpacaBar>,
    #[serde(rename = "dailyBar")]
    daily_bar: Option<AlpacaBar>,
    #[serde(rename = "prevDailyBar")]
    prev_daily_bar: Option<AlpacaBar>,
}

#[derive(Debug, Deserialize)]
struct AlpacaSnapshotsResponse {
    #[serde(default)]
    snapshots: HashMap<String, AlpacaStockSnapshot>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBarsResponse {
    #[serde(default)]
    bars: HashMap<String, Vec<AlpacaBar>>,
}

#[derive(Debug, Deserialize)]
struct AlpacaQuotesResponse {
    #[serde(default)]
    quotes: HashMap<String, AlpacaQuote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_stock_snapshot_prefers_live_trade_and_baseline_daily() {
        let live = AlpacaStockSnapshot {
            latest_trade: Some(AlpacaTrade { price: 152.50, timestamp: Utc::now() }),
            ..Default::default()
        };
        let baseline = AlpacaStockSnapshot {
            daily_bar: Some(AlpacaBar { open: 150.0, close: 151.0, timestamp: Utc::now() }),
            prev_daily_bar: Some(AlpacaBar { open: 148.0, close: 149.10, timestamp: Utc::now() }),
            ..Default::default()
        };
        let merged = merge_stock_snapshot(Some(&live), Some(&baseline));
        assert_eq!(merged.trade.unwrap().price, Some(152.50));
        assert_eq!(merged.daily_bar.unwrap().open, Some(150.0));
        assert_eq!(merged.prev_daily.unwrap().close, Some(149.10));
    }
}

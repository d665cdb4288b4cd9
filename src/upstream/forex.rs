// =============================================================================
// Forex upstream adapter
// =============================================================================
//
// Grounded on
// `original_source/raspberry-pi-hub/releases/.../twelvedata_client.py`.
// Batches of `batch_size` symbols per request, with an inter-batch delay.
// A `CreditTracker` enforces the per-minute/per-day credit budgets; one
// symbol = one credit. When exhausted mid-job the remaining symbols are
// simply absent from the result map (spec §7 UpstreamBudgetExhausted).
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::model::{QuotePoint, RawSnapshot, TradePoint};
use crate::upstream::rate_limit::CreditTracker;

const BASE_URL: &str = "https://api.twelvedata.com";

pub struct ForexClient {
    client: reqwest::Client,
    batch_size: usize,
    batch_delay: Duration,
    credits: CreditTracker,
}

impl ForexClient {
    pub fn new(
        timeout: Duration,
        batch_size: usize,
        batch_delay: Duration,
        credits_per_minute: u32,
        credits_per_day: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build forex reqwest client");
        Self {
            client,
            batch_size: batch_size.max(1).min(8),
            batch_delay,
            credits: CreditTracker::new(credits_per_minute, credits_per_day),
        }
    }

    /// Fetch quotes for `symbols` (hub canonical `BASE/QUOTE` spelling).
    /// Returns a map keyed by the same canonical spelling the caller passed
    /// in. Stops issuing requests once the credit budget is exhausted,
    /// dropping the remainder of the batch list rather than erroring.
    pub async fn fetch(&self, symbols: &[String], api_key: Option<&str>) -> HashMap<String, RawSnapshot> {
        let Some(api_key) = api_key else {
            warn!("no forex credential on file, skipping forex class");
            return HashMap::new();
        };
        if symbols.is_empty() {
            return HashMap::new();
        }

        let symbols: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        let mut results = HashMap::new();
        let chunks: Vec<&[String]> = symbols.chunks(self.batch_size).collect();

        for (i, chunk) in chunks.iter().enumerate() {
            if !self.credits.can_send(chunk.len() as u32) {
                self.credits.note_exhausted(symbols.len() - results.len());
                break;
            }

            // Provider spelling is the same as the hub's canonical form for
            // forex (`BASE/QUOTE`), so no translation is needed on the way out.
            let query = chunk.join(",");
            let resp = self
                .client
                .get(format!("{BASE_URL}/quote"))
                .query(&[("symbol", query.as_str()), ("apikey", api_key)])
                .send()
                .await;

            self.credits.record_spend(chunk.len() as u32);

            let body = match resp {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    warn!(status = %r.status(), "forex quote batch failed");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "forex quote batch errored");
                    continue;
                }
            };

            let parsed: TwelveDataQuoteBatch = match body.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "failed to decode forex quote response");
                    continue;
                }
            };

            for (symbol, quote) in parsed.into_map() {
                if let Some(snapshot) = quote.into_snapshot() {
                    results.insert(symbol.to_uppercase(), snapshot);
                }
            }

            if i + 1 < chunks.len() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        results
    }
}

#[derive(Debug, Deserialize)]
struct TwelveDataQuote {
    #[serde(default)]
    symbol: Option<String>,
    price: Option<String>,
    close: Option<String>,
    previous_close: Option<String>,
    #[serde(default)]
    bid: Option<String>,
    #[serde(default)]
    ask: Option<String>,
    datetime: Option<String>,
}

impl TwelveDataQuote {
    fn into_snapshot(self) -> Option<RawSnapshot> {
        let last: f64 = self
            .price
            .as_deref()
            .or(self.close.as_deref())
            .and_then(|s| s.parse().ok())?;
        let prev_close: f64 = self
            .previous_close
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(last);
        let bid: f64 = self.bid.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let ask: f64 = self.ask.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let timestamp = self.datetime.as_deref().and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .ok()
        });

        Some(RawSnapshot {
            trade: Some(TradePoint { price: Some(last), timestamp }),
            quote: Some(QuotePoint { bid: Some(bid), ask: Some(ask), timestamp }),
            minute_bar: None,
            daily_bar: Some(crate::model::BarPoint { open: Some(prev_close), close: None, timestamp }),
            prev_daily: Some(crate::model::BarPoint { open: None, close: Some(prev_close), timestamp }),
        })
    }
}

/// Twelve Data's `/quote` endpoint returns either a single object (one
/// symbol requested) or a map keyed by symbol (batch request).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TwelveDataQuoteBatch {
    Single(TwelveDataQuote),
    Batch(HashMap<String, TwelveDataQuote>),
}

impl TwelveDataQuoteBatch {
    fn into_map(self) -> HashMap<String, TwelveDataQuote> {
        match self {
            TwelveDataQuoteBatch::Single(q) => {
                let mut m = HashMap::new();
                if let Some(symbol) = q.symbol.clone() {
                    m.insert(symbol, q);
                }
                m
            }
            TwelveDataQuoteBatch::Batch(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_without_price_or_close_yields_no_snapshot() {
        let q = TwelveDataQuote {
            symbol: Some("EUR/USD".into()),
            price: None,
            close: None,
            previous_close: None,
            bid: None,
            ask: None,
            datetime: None,
        };
        assert!(q.into_snapshot().is_none());
    }

    #[test]
    fn quote_defaults_prev_close_to_last_when_absent() {
        let q = TwelveDataQuote {
            symbol: Some("EUR/USD".into()),
            price: Some("1.0850".into()),
            close: None,
            previous_close: None,
            bid: None,
            ask: None,
            datetime: None,
        };
        let snapshot = q.into_snapshot().unwrap();
        assert_eq!(snapshot.trade.unwrap().price, Some(1.0850));
        assert_eq!(snapshot.prev_daily.unwrap().close, Some(1.0850));
    }
}

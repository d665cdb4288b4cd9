use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AssetClass;

/// A normalized, persisted snapshot for one `(symbol, asset_class, date)`.
///
/// `open_price` and `prev_close` are sticky baselines; `last_price` is
/// overwritten on every successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub date: NaiveDate,
    pub open_price: Option<f64>,
    pub prev_close: Option<f64>,
    pub last_price: Option<f64>,
    pub last_updated: DateTime<Utc>,
    /// Computed on read from `(prev_close, open_price, last_price)`, never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
}

impl PriceRecord {
    /// Baseline used for change computation: `prev_close` unless it is
    /// null or zero, else `open_price`, else zero.
    pub fn with_change(mut self) -> Self {
        let last = self.last_price.unwrap_or(0.0);
        let baseline = match self.prev_close {
            Some(pc) if pc != 0.0 => pc,
            _ => self.open_price.unwrap_or(0.0),
        };

        if baseline != 0.0 && last != 0.0 {
            let amount = last - baseline;
            self.change_amount = Some((amount * 10000.0).round() / 10000.0);
            self.change_percent = Some(((amount / baseline) * 100.0 * 100.0).round() / 100.0);
        } else {
            self.change_amount = Some(0.0);
            self.change_percent = Some(0.0);
        }
        self
    }
}

/// One provider quote/trade point: price plus the instant it was observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradePoint {
    pub price: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Bid/ask pair as reported by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotePoint {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// An OHLC bar (minute or daily granularity, distinguished by which field of
/// `RawSnapshot` holds it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarPoint {
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// The richer, structured shape both upstream adapters populate before
/// handing a symbol to the normalizer. Equities/crypto snapshots populate
/// these sub-records naturally; the forex adapter (which only ever has one
/// flat quote) maps its single quote into the same shape so one normalizer
/// implementation serves both asset classes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub trade: Option<TradePoint>,
    pub quote: Option<QuotePoint>,
    pub minute_bar: Option<BarPoint>,
    pub daily_bar: Option<BarPoint>,
    pub prev_daily: Option<BarPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(open: Option<f64>, prev_close: Option<f64>, last: Option<f64>) -> PriceRecord {
        PriceRecord {
            symbol: "AAPL".into(),
            asset_class: AssetClass::Stocks,
            date: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap().date_naive(),
            open_price: open,
            prev_close: prev_close,
            last_price: last,
            last_updated: Utc::now(),
            change_amount: None,
            change_percent: None,
        }
    }

    #[test]
    fn change_prefers_prev_close_baseline() {
        let r = record(None, Some(100.0), Some(101.0)).with_change();
        assert_eq!(r.change_amount, Some(1.0));
        assert_eq!(r.change_percent, Some(1.0));
    }

    #[test]
    fn change_falls_back_to_open_when_prev_close_zero() {
        let r = record(Some(50.0), Some(0.0), Some(55.0)).with_change();
        assert_eq!(r.change_amount, Some(5.0));
        assert_eq!(r.change_percent, Some(10.0));
    }

    #[test]
    fn change_is_zero_when_no_baseline() {
        let r = record(None, None, Some(5.0)).with_change();
        assert_eq!(r.change_amount, Some(0.0));
        assert_eq!(r.change_percent, Some(0.0));
    }
}

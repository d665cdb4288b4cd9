// =============================================================================
// Normalizer — merges one or two raw upstream snapshots into a PriceRecord
// =============================================================================
//
// Grounded on `alpaca_client.py`'s `_build_stock_price_from_snapshots` and
// `get_latest_crypto_prices`: both upstream adapters populate the same
// `RawSnapshot` shape so this single derivation serves stocks, crypto, and
// forex alike (spec §4.C / §9 "dynamic row shapes" redesign flag).
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{PriceRecord, RawSnapshot};
use crate::types::AssetClass;

/// Mid-price of a bid/ask pair, falling back to whichever side is positive,
/// else zero.
fn mid(bid: Option<f64>, ask: Option<f64>) -> Option<f64> {
    match (bid.filter(|b| *b > 0.0), ask.filter(|a| *a > 0.0)) {
        (Some(b), Some(a)) => Some((b + a) / 2.0),
        (Some(b), None) => Some(b),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// Produce a normalized `PriceRecord` from one or two raw snapshots for a
/// symbol, per the seven-step derivation in spec §4.C. Returns `None` if no
/// `last` price can be derived — the caller must then drop the symbol from
/// this refresh rather than write a row.
pub fn normalize(
    symbol: &str,
    class: AssetClass,
    live: &RawSnapshot,
    baseline: Option<&RawSnapshot>,
    date: NaiveDate,
) -> Option<PriceRecord> {
    let baseline = baseline.unwrap_or(live);

    let today = Utc::now().date_naive();
    let trade = live.trade.as_ref();
    let trade_is_stale = trade
        .and_then(|t| t.timestamp)
        .map(|ts| ts.date_naive() != today)
        .unwrap_or(false);

    let minute_close = live.minute_bar.as_ref().and_then(|b| b.close);
    let trade_price = trade.and_then(|t| t.price);

    let quote_bid = live.quote.as_ref().and_then(|q| q.bid);
    let quote_ask = live.quote.as_ref().and_then(|q| q.ask);
    let daily_close = baseline.daily_bar.as_ref().and_then(|b| b.close);

    // A daily bar fetched via the multi-day bars endpoint (crypto's only
    // source of `daily_bar`) can be the prior trading day's, stale next to a
    // live quote taken today. A snapshot-fed `daily_bar` (stocks) instead
    // updates intraday, so it stays ahead of the quote in the fallback chain.
    let quote_is_fresh = live
        .quote
        .as_ref()
        .and_then(|q| q.timestamp)
        .map(|ts| ts.date_naive() == today)
        .unwrap_or(false);

    let last = if trade_is_stale && minute_close.is_some() {
        minute_close
    } else if trade_price.is_none() && minute_close.is_none() && quote_is_fresh {
        mid(quote_bid, quote_ask).or(daily_close)
    } else {
        trade_price.or(minute_close).or(daily_close).or_else(|| mid(quote_bid, quote_ask))
    };

    let last = last?;

    let mut open = baseline
        .daily_bar
        .as_ref()
        .and_then(|b| b.open)
        .or_else(|| live.minute_bar.as_ref().and_then(|b| b.open))
        .or_else(|| baseline.prev_daily.as_ref().and_then(|b| b.open));

    let mut prev_close = baseline
        .prev_daily
        .as_ref()
        .and_then(|b| b.close)
        .or_else(|| baseline.daily_bar.as_ref().and_then(|b| b.open));

    if prev_close.is_none() {
        prev_close = open.or(Some(last));
    }
    if open.is_none() {
        open = prev_close.or(Some(last));
    }

    let timestamp = trade
        .and_then(|t| t.timestamp)
        .or_else(|| live.quote.as_ref().and_then(|q| q.timestamp))
        .or_else(|| live.minute_bar.as_ref().and_then(|b| b.timestamp))
        .or_else(|| baseline.daily_bar.as_ref().and_then(|b| b.timestamp))
        .unwrap_or_else(Utc::now);

    Some(
        PriceRecord {
            symbol: symbol.to_string(),
            asset_class: class,
            date,
            open_price: open,
            prev_close,
            last_price: Some(last),
            last_updated: timestamp,
            change_amount: None,
            change_percent: None,
        }
        .with_change(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BarPoint, QuotePoint, TradePoint};
    use chrono::{Duration, TimeZone};

    fn snapshot_today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn prefers_minute_bar_close_when_trade_is_stale() {
        // Testable property 6: live.trade_price dated yesterday is stale,
        // minute_bar.close wins even though a daily baseline is present.
        let yesterday = Utc::now() - Duration::days(1);
        let live = RawSnapshot {
            trade: Some(TradePoint { price: Some(10.0), timestamp: Some(yesterday) }),
            minute_bar: Some(BarPoint { open: None, close: Some(11.0), timestamp: None }),
            ..Default::default()
        };
        let record = normalize("AAPL", AssetClass::Stocks, &live, None, snapshot_today()).unwrap();
        assert_eq!(record.last_price, Some(11.0));
    }

    #[test]
    fn scenario_b_stock_merge() {
        let live = RawSnapshot {
            trade: Some(TradePoint { price: Some(152.50), timestamp: Some(Utc::now()) }),
            ..Default::default()
        };
        let baseline = RawSnapshot {
            daily_bar: Some(BarPoint { open: Some(150.00), close: None, timestamp: None }),
            prev_daily: Some(BarPoint { open: None, close: Some(149.10), timestamp: None }),
            ..Default::default()
        };
        let record = normalize("AAPL", AssetClass::Stocks, &live, Some(&baseline), snapshot_today()).unwrap();
        assert_eq!(record.last_price, Some(152.50));
        assert_eq!(record.open_price, Some(150.00));
        assert_eq!(record.prev_close, Some(149.10));
        assert_eq!(record.change_amount, Some(3.40));
        assert_eq!(record.change_percent, Some(2.28));
    }

    #[test]
    fn scenario_c_crypto_weekend_single_daily_bar() {
        // Sunday: only Saturday's daily bar exists, so prev_close falls back
        // to that bar's open per the sticky-fallback chain.
        let live = RawSnapshot {
            quote: Some(QuotePoint { bid: Some(42000.0), ask: Some(42010.0), timestamp: Some(Utc::now()) }),
            ..Default::default()
        };
        let baseline = RawSnapshot {
            daily_bar: Some(BarPoint { open: Some(41500.0), close: Some(41800.0), timestamp: None }),
            ..Default::default()
        };
        let record = normalize("BTC/USD", AssetClass::Crypto, &live, Some(&baseline), snapshot_today()).unwrap();
        assert_eq!(record.last_price, Some(42005.0));
        assert_eq!(record.open_price, Some(41500.0));
        assert_eq!(record.prev_close, Some(41500.0));
        assert_eq!(record.change_amount, Some(505.0));
    }

    #[test]
    fn drops_symbol_when_last_cannot_be_derived() {
        let live = RawSnapshot::default();
        assert!(normalize("EUR/USD", AssetClass::Forex, &live, None, snapshot_today()).is_none());
    }

    #[test]
    fn falls_back_to_prev_close_then_open_then_last_chain() {
        let live = RawSnapshot {
            trade: Some(TradePoint { price: Some(5.0), timestamp: Some(Utc::now()) }),
            ..Default::default()
        };
        let record = normalize("XYZ", AssetClass::Stocks, &live, None, snapshot_today()).unwrap();
        assert_eq!(record.last_price, Some(5.0));
        assert_eq!(record.prev_close, Some(5.0));
        assert_eq!(record.open_price, Some(5.0));
    }

    #[test]
    fn mid_prefers_positive_side_when_only_one_present() {
        let live = RawSnapshot {
            quote: Some(QuotePoint { bid: Some(0.0), ask: Some(1.2345), timestamp: None }),
            ..Default::default()
        };
        let record = normalize("USD/CAD", AssetClass::Forex, &live, None, snapshot_today()).unwrap();
        assert_eq!(record.last_price, Some(1.2345));
    }

    #[test]
    fn timestamp_unused_but_date_is_threaded_through() {
        let d = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap().date_naive();
        let live = RawSnapshot {
            trade: Some(TradePoint { price: Some(1.0), timestamp: Some(Utc::now()) }),
            ..Default::default()
        };
        let record = normalize("AAPL", AssetClass::Stocks, &live, None, d).unwrap();
        assert_eq!(record.date, d);
    }
}

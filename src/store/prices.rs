use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};

use super::Store;
use crate::error::HubError;
use crate::model::PriceRecord;
use crate::types::AssetClass;

impl Store {
    /// If a row exists for `(symbol, class, date)`, `last_price`/`last_updated`
    /// are always overwritten; `open_price`/`prev_close` are overwritten only
    /// when the caller supplies a non-null value (sticky baselines). If no
    /// row exists, inserts with the supplied fields.
    pub async fn upsert_price(
        &self,
        symbol: &str,
        class: AssetClass,
        date: NaiveDate,
        open_price: Option<f64>,
        prev_close: Option<f64>,
        last_price: f64,
    ) -> Result<(), HubError> {
        let now = Utc::now();

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM asset_prices WHERE symbol = ? AND asset_class = ? AND date = ?",
        )
        .bind(symbol)
        .bind(class.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id,)) = existing {
            sqlx::query(
                "UPDATE asset_prices
                 SET open_price = COALESCE(?, open_price),
                     prev_close = COALESCE(?, prev_close),
                     last_price = ?,
                     last_updated = ?
                 WHERE id = ?",
            )
            .bind(open_price)
            .bind(prev_close)
            .bind(last_price)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO asset_prices
                 (symbol, asset_class, date, open_price, prev_close, last_price, last_updated)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(symbol)
            .bind(class.as_str())
            .bind(date)
            .bind(open_price)
            .bind(prev_close)
            .bind(last_price)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Enabled-only rows of the most recent date per `(symbol, class)`, each
    /// annotated with computed `change_amount`/`change_percent`.
    pub async fn get_latest_prices(
        &self,
        class: Option<AssetClass>,
        symbol: Option<&str>,
    ) -> Result<Vec<PriceRecord>, HubError> {
        #[allow(clippy::type_complexity)]
        let rows: Vec<(String, String, NaiveDate, Option<f64>, Option<f64>, Option<f64>, DateTime<Utc>)> =
            match (class, symbol) {
                (Some(c), Some(s)) => sqlx::query_as(LATEST_PRICES_BASE_QUERY_WITH_CLASS_AND_SYMBOL)
                    .bind(c.as_str())
                    .bind(s)
                    .fetch_all(&self.pool)
                    .await?,
                (Some(c), None) => sqlx::query_as(LATEST_PRICES_BASE_QUERY_WITH_CLASS)
                    .bind(c.as_str())
                    .fetch_all(&self.pool)
                    .await?,
                (None, Some(s)) => sqlx::query_as(LATEST_PRICES_BASE_QUERY_WITH_SYMBOL)
                    .bind(s)
                    .fetch_all(&self.pool)
                    .await?,
                (None, None) => sqlx::query_as(LATEST_PRICES_BASE_QUERY)
                    .fetch_all(&self.pool)
                    .await?,
            };

        Ok(rows
            .into_iter()
            .filter_map(|(symbol, class, date, open_price, prev_close, last_price, last_updated)| {
                AssetClass::from_str(&class).ok().map(|asset_class| {
                    PriceRecord {
                        symbol,
                        asset_class,
                        date,
                        open_price,
                        prev_close,
                        last_price,
                        last_updated,
                        change_amount: None,
                        change_percent: None,
                    }
                    .with_change()
                })
            })
            .collect())
    }
}

const LATEST_PRICES_BASE_QUERY: &str = "
    SELECT ap.symbol, ap.asset_class, ap.date, ap.open_price, ap.prev_close, ap.last_price, ap.last_updated
    FROM asset_prices ap
    JOIN selected_assets sa ON ap.symbol = sa.symbol AND ap.asset_class = sa.asset_class AND sa.enabled = 1
    WHERE ap.date = (SELECT MAX(date) FROM asset_prices ap2 WHERE ap2.symbol = ap.symbol AND ap2.asset_class = ap.asset_class)
    ORDER BY ap.symbol";

const LATEST_PRICES_BASE_QUERY_WITH_CLASS: &str = "
    SELECT ap.symbol, ap.asset_class, ap.date, ap.open_price, ap.prev_close, ap.last_price, ap.last_updated
    FROM asset_prices ap
    JOIN selected_assets sa ON ap.symbol = sa.symbol AND ap.asset_class = sa.asset_class AND sa.enabled = 1
    WHERE ap.date = (SELECT MAX(date) FROM asset_prices ap2 WHERE ap2.symbol = ap.symbol AND ap2.asset_class = ap.asset_class)
      AND ap.asset_class = ?
    ORDER BY ap.symbol";

const LATEST_PRICES_BASE_QUERY_WITH_SYMBOL: &str = "
    SELECT ap.symbol, ap.asset_class, ap.date, ap.open_price, ap.prev_close, ap.last_price, ap.last_updated
    FROM asset_prices ap
    JOIN selected_assets sa ON ap.symbol = sa.symbol AND ap.asset_class = sa.asset_class AND sa.enabled = 1
    WHERE ap.date = (SELECT MAX(date) FROM asset_prices ap2 WHERE ap2.symbol = ap.symbol AND ap2.asset_class = ap.asset_class)
      AND ap.symbol = ?
    ORDER BY ap.symbol";

const LATEST_PRICES_BASE_QUERY_WITH_CLASS_AND_SYMBOL: &str = "
    SELECT ap.symbol, ap.asset_class, ap.date, ap.open_price, ap.prev_close, ap.last_price, ap.last_updated
    FROM asset_prices ap
    JOIN selected_assets sa ON ap.symbol = sa.symbol AND ap.asset_class = sa.asset_class AND sa.enabled = 1
    WHERE ap.date = (SELECT MAX(date) FROM asset_prices ap2 WHERE ap2.symbol = ap.symbol AND ap2.asset_class = ap.asset_class)
      AND ap.asset_class = ? AND ap.symbol = ?
    ORDER BY ap.symbol";

#[cfg(test)]
mod tests {
    use crate::store::test_support::test_store;
    use crate::types::AssetClass;
    use chrono::Utc;

    #[tokio::test]
    async fn upsert_idempotence_preserves_sticky_baselines() {
        let store = test_store().await;
        store.add_asset("AAPL", AssetClass::Stocks).await.unwrap();
        let date = Utc::now().date_naive();

        store
            .upsert_price("AAPL", AssetClass::Stocks, date, Some(150.0), Some(149.10), 152.50)
            .await
            .unwrap();
        store
            .upsert_price("AAPL", AssetClass::Stocks, date, None, None, 153.0)
            .await
            .unwrap();

        let prices = store.get_latest_prices(Some(AssetClass::Stocks), Some("AAPL")).await.unwrap();
        let p = &prices[0];
        assert_eq!(p.open_price, Some(150.0));
        assert_eq!(p.prev_close, Some(149.10));
        assert_eq!(p.last_price, Some(153.0));
    }

    #[tokio::test]
    async fn upsert_overwrites_baseline_when_new_value_differs() {
        let store = test_store().await;
        store.add_asset("AAPL", AssetClass::Stocks).await.unwrap();
        let date = Utc::now().date_naive();

        store
            .upsert_price("AAPL", AssetClass::Stocks, date, Some(150.0), None, 152.0)
            .await
            .unwrap();
        store
            .upsert_price("AAPL", AssetClass::Stocks, date, Some(151.0), None, 152.5)
            .await
            .unwrap();

        let prices = store.get_latest_prices(Some(AssetClass::Stocks), Some("AAPL")).await.unwrap();
        assert_eq!(prices[0].open_price, Some(151.0));
    }

    #[tokio::test]
    async fn scenario_b_stocks_change_calculation() {
        let store = test_store().await;
        store.add_asset("AAPL", AssetClass::Stocks).await.unwrap();
        let date = Utc::now().date_naive();
        store
            .upsert_price("AAPL", AssetClass::Stocks, date, Some(150.00), Some(149.10), 152.50)
            .await
            .unwrap();

        let prices = store.get_latest_prices(Some(AssetClass::Stocks), Some("AAPL")).await.unwrap();
        let p = &prices[0];
        assert_eq!(p.last_price, Some(152.50));
        assert_eq!(p.open_price, Some(150.00));
        assert_eq!(p.prev_close, Some(149.10));
        assert_eq!(p.change_amount, Some(3.40));
        assert_eq!(p.change_percent, Some(2.28));
    }
}

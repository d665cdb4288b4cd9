use std::str::FromStr;

use super::Store;
use crate::error::HubError;
use crate::model::SelectedAsset;
use crate::types::AssetClass;

impl Store {
    /// Idempotent on the unique `(symbol, class)` key.
    pub async fn add_asset(&self, symbol: &str, class: AssetClass) -> Result<(), HubError> {
        sqlx::query(
            "INSERT INTO selected_assets (symbol, asset_class, enabled) VALUES (?, ?, 1)
             ON CONFLICT(symbol, asset_class) DO NOTHING",
        )
        .bind(symbol)
        .bind(class.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cascades to `PriceRecord`s with the same key.
    pub async fn remove_asset(&self, symbol: &str, class: AssetClass) -> Result<(), HubError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM selected_assets WHERE symbol = ? AND asset_class = ?")
            .bind(symbol)
            .bind(class.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM asset_prices WHERE symbol = ? AND asset_class = ?")
            .bind(symbol)
            .bind(class.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_asset_enabled(&self, symbol: &str, class: AssetClass, enabled: bool) -> Result<(), HubError> {
        sqlx::query("UPDATE selected_assets SET enabled = ? WHERE symbol = ? AND asset_class = ?")
            .bind(enabled)
            .bind(symbol)
            .bind(class.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_assets(
        &self,
        class: Option<AssetClass>,
        include_disabled: bool,
    ) -> Result<Vec<SelectedAsset>, HubError> {
        let rows: Vec<(String, String, bool)> = match (class, include_disabled) {
            (Some(c), false) => {
                sqlx::query_as(
                    "SELECT symbol, asset_class, enabled FROM selected_assets WHERE asset_class = ? AND enabled = 1",
                )
                .bind(c.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            (Some(c), true) => {
                sqlx::query_as("SELECT symbol, asset_class, enabled FROM selected_assets WHERE asset_class = ?")
                    .bind(c.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, false) => {
                sqlx::query_as("SELECT symbol, asset_class, enabled FROM selected_assets WHERE enabled = 1")
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, true) => {
                sqlx::query_as("SELECT symbol, asset_class, enabled FROM selected_assets")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows
            .into_iter()
            .filter_map(|(symbol, class, enabled)| {
                AssetClass::from_str(&class).ok().map(|asset_class| SelectedAsset {
                    symbol,
                    asset_class,
                    enabled,
                })
            })
            .collect())
    }

    pub async fn count_enabled_assets(&self, class: AssetClass) -> Result<i64, HubError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM selected_assets WHERE asset_class = ? AND enabled = 1",
        )
        .bind(class.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Whether any class has at least one enabled asset — the scheduler has
    /// something to dispatch against.
    pub async fn has_enabled_assets(&self) -> Result<bool, HubError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM selected_assets WHERE enabled = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::test_store;
    use crate::types::AssetClass;

    #[tokio::test]
    async fn add_asset_is_idempotent() {
        let store = test_store().await;
        store.add_asset("AAPL", AssetClass::Stocks).await.unwrap();
        store.add_asset("AAPL", AssetClass::Stocks).await.unwrap();
        let assets = store.list_assets(Some(AssetClass::Stocks), false).await.unwrap();
        assert_eq!(assets.len(), 1);
    }

    #[tokio::test]
    async fn remove_asset_cascades_to_prices() {
        let store = test_store().await;
        store.add_asset("MSFT", AssetClass::Stocks).await.unwrap();
        store
            .upsert_price("MSFT", AssetClass::Stocks, chrono::Utc::now().date_naive(), Some(1.0), Some(1.0), 2.0)
            .await
            .unwrap();
        store.remove_asset("MSFT", AssetClass::Stocks).await.unwrap();
        let prices = store.get_latest_prices(Some(AssetClass::Stocks), Some("MSFT")).await.unwrap();
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn list_assets_respects_enabled_filter() {
        let store = test_store().await;
        store.add_asset("AAPL", AssetClass::Stocks).await.unwrap();
        store.add_asset("MSFT", AssetClass::Stocks).await.unwrap();
        store.set_asset_enabled("MSFT", AssetClass::Stocks, false).await.unwrap();

        let enabled_only = store.list_assets(Some(AssetClass::Stocks), false).await.unwrap();
        assert_eq!(enabled_only.len(), 1);
        assert_eq!(enabled_only[0].symbol, "AAPL");

        let all = store.list_assets(Some(AssetClass::Stocks), true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn count_enabled_assets_ignores_disabled() {
        let store = test_store().await;
        store.add_asset("AAPL", AssetClass::Stocks).await.unwrap();
        store.add_asset("MSFT", AssetClass::Stocks).await.unwrap();
        store.set_asset_enabled("MSFT", AssetClass::Stocks, false).await.unwrap();
        assert_eq!(store.count_enabled_assets(AssetClass::Stocks).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn has_enabled_assets_reflects_any_class() {
        let store = test_store().await;
        assert!(!store.has_enabled_assets().await.unwrap());
        store.add_asset("EUR/USD", AssetClass::Forex).await.unwrap();
        assert!(store.has_enabled_assets().await.unwrap());
        store.set_asset_enabled("EUR/USD", AssetClass::Forex, false).await.unwrap();
        assert!(!store.has_enabled_assets().await.unwrap());
    }
}

// Credentials are just two rows in the generic `config` table, matching the
// original hub's `save_config`/`get_config` scheme rather than a dedicated
// credentials table.

use super::Store;
use crate::error::HubError;

impl Store {
    pub async fn get_credential(&self, provider: &str) -> Result<Option<(String, String)>, HubError> {
        let key_row: Option<(String,)> = sqlx::query_as("SELECT value FROM config WHERE key = ?")
            .bind(format!("{provider}_api_key"))
            .fetch_optional(&self.pool)
            .await?;
        let secret_row: Option<(String,)> = sqlx::query_as("SELECT value FROM config WHERE key = ?")
            .bind(format!("{provider}_api_secret"))
            .fetch_optional(&self.pool)
            .await?;

        match (key_row, secret_row) {
            (Some((key,)), Some((secret,))) => Ok(Some((key, secret))),
            _ => Ok(None),
        }
    }

    pub async fn put_credential(&self, provider: &str, key: &str, secret: &str) -> Result<(), HubError> {
        sqlx::query("INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)")
            .bind(format!("{provider}_api_key"))
            .bind(key)
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)")
            .bind(format!("{provider}_api_secret"))
            .bind(secret)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::test_store;

    #[tokio::test]
    async fn missing_credential_is_none() {
        let store = test_store().await;
        assert!(store.get_credential("alpaca").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = test_store().await;
        store.put_credential("alpaca", "key1", "secret1").await.unwrap();
        let (key, secret) = store.get_credential("alpaca").await.unwrap().unwrap();
        assert_eq!(key, "key1");
        assert_eq!(secret, "secret1");
    }

    #[tokio::test]
    async fn put_overwrites_previous_value() {
        let store = test_store().await;
        store.put_credential("twelvedata", "a", "b").await.unwrap();
        store.put_credential("twelvedata", "c", "d").await.unwrap();
        let (key, secret) = store.get_credential("twelvedata").await.unwrap().unwrap();
        assert_eq!(key, "c");
        assert_eq!(secret, "d");
    }
}

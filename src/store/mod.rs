// =============================================================================
// Store — durable local state behind a pooled, migrated SQLite connection
// =============================================================================
//
// Every entity in the data model gets its own repo submodule. `Store` itself
// only owns the pool and runs migrations; callers never see a raw connection.
// =============================================================================

mod assets;
mod credentials;
mod devices;
mod prices;

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 5).await
    }

    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{db_path}?mode=rwc");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("failed to connect to hub database")?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout=5000").execute(&pool).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run hub database migrations")?;
        Ok(())
    }

    /// Probe the underlying storage engine.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) async fn test_store() -> Store {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite");
        let store = Store { pool };
        store.migrate().await.expect("run migrations");
        store
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_store;

    #[tokio::test]
    async fn health_check_reports_ok_on_fresh_store() {
        let store = test_store().await;
        assert!(store.health_check().await);
    }
}

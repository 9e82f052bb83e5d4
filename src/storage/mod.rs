use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;

use crate::Result;
use crate::config::DatabaseConfig;

pub mod history;
pub mod products;
pub mod tracking;
pub mod variants;

/// Handle to the SQLite pool. Cloning is cheap; all clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        // Ensure the parent directory exists for file-backed databases
        if let Some(path) = config.url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await
            .map_err(sqlx::Error::from)?;

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps every
    /// statement on the same `:memory:` instance.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Creates the schema. Every statement is idempotent, so running this on
    /// an existing database is a no-op.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                canonical_url TEXT,
                name TEXT,
                vendor TEXT,
                main_image_url TEXT,
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variants (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                sku TEXT,
                attributes_json TEXT NOT NULL DEFAULT '{}',
                variant_url TEXT,
                currency TEXT,
                current_price TEXT,
                previous_price TEXT,
                discount_percent REAL,
                current_stock_status TEXT,
                previous_stock_status TEXT,
                is_available INTEGER NOT NULL DEFAULT 0,
                last_checked_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (product_id) REFERENCES products(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variant_price_history (
                id TEXT PRIMARY KEY,
                variant_id TEXT NOT NULL,
                price TEXT NOT NULL,
                currency TEXT,
                recorded_at TEXT NOT NULL,
                FOREIGN KEY (variant_id) REFERENCES variants(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS variant_stock_history (
                id TEXT PRIMARY KEY,
                variant_id TEXT NOT NULL,
                status TEXT NOT NULL,
                quantity INTEGER,
                recorded_at TEXT NOT NULL,
                FOREIGN KEY (variant_id) REFERENCES variants(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_checks (
                id TEXT PRIMARY KEY,
                variant_id TEXT NOT NULL,
                outcome TEXT NOT NULL,
                status TEXT,
                price TEXT,
                confidence INTEGER,
                strategy TEXT,
                reason TEXT,
                checked_at TEXT NOT NULL,
                FOREIGN KEY (variant_id) REFERENCES variants(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracked_items (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                variant_id TEXT NOT NULL,
                target_price TEXT,
                notify_on_price_drop INTEGER NOT NULL DEFAULT 1,
                price_drop_percent REAL NOT NULL DEFAULT 0,
                notify_on_back_in_stock INTEGER NOT NULL DEFAULT 1,
                notify_on_any_stock_change INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                last_notified_at TEXT,
                last_alerted_at TEXT,
                last_checked_at TEXT,
                last_price TEXT,
                last_stock_status TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, variant_id),
                FOREIGN KEY (variant_id) REFERENCES variants(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                tracked_item_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                variant_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                metadata_json TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (tracked_item_id) REFERENCES tracked_items(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_variants_product_id ON variants(product_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_price_history_variant \
             ON variant_price_history(variant_id, recorded_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_stock_history_variant \
             ON variant_stock_history(variant_id, recorded_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_stock_checks_variant \
             ON stock_checks(variant_id, checked_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tracked_items_variant \
             ON tracked_items(variant_id, active)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_item \
             ON notifications(tracked_item_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    let db = Database::connect_in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db
}

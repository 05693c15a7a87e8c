//! Local offline cache
//!
//! Durable SQLite store for categories and cards created without a remote
//! session. Records are keyed by entity id; deleting a category removes the
//! cards that reference it in the same transaction.
//!
//! System content is never written here, so `cards.category_id` is not a SQL
//! foreign key: a cached card may legitimately point at a system category.

pub mod cards;
pub mod categories;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Current on-disk schema version (stored in `PRAGMA user_version`)
pub const SCHEMA_VERSION: i64 = 1;

/// Local cache error
#[derive(Debug, Error)]
pub enum CacheError {
    /// Store could not be opened or has an unsupported schema
    #[error("Local cache unavailable: {0}")]
    Unavailable(String),

    #[error("Local cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found in local cache: {0}")]
    NotFound(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Handle to the local cache database
#[derive(Debug, Clone)]
pub struct LocalCache {
    pool: SqlitePool,
}

impl LocalCache {
    /// Open (creating if needed) the cache at `db_path`
    pub async fn open(db_path: &Path) -> CacheResult<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::Unavailable(format!("create {} failed: {}", parent.display(), e))
            })?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new local cache: {}", db_path.display());
        } else {
            info!("Opened existing local cache: {}", db_path.display());
        }

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    /// Private in-memory cache (tests and cache-less demos)
    pub async fn open_in_memory() -> CacheResult<Self> {
        // One connection that never expires; each sqlite memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema version recorded in the database file
    pub async fn schema_version(&self) -> CacheResult<i64> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        Ok(version)
    }

    async fn ensure_schema(&self) -> CacheResult<()> {
        let version = self.schema_version().await?;
        if version > SCHEMA_VERSION {
            return Err(CacheError::Unavailable(format!(
                "schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        // CREATE IF NOT EXISTS keeps this idempotent
        categories::create_table(&self.pool).await?;
        cards::create_table(&self.pool).await?;

        if version < SCHEMA_VERSION {
            let pragma = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
            sqlx::query(&pragma).execute(&self.pool).await?;
            debug!(from = version, to = SCHEMA_VERSION, "Local cache schema upgraded");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_file_and_sets_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("board.db");

        let cache = LocalCache::open(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(cache.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_reopen_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("board.db");

        drop(LocalCache::open(&path).await.unwrap());
        let cache = LocalCache::open(&path).await.unwrap();
        assert_eq!(cache.schema_version().await.unwrap(), SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("board.db");

        let cache = LocalCache::open(&path).await.unwrap();
        sqlx::query("PRAGMA user_version = 99")
            .execute(cache.pool())
            .await
            .unwrap();
        cache.pool().close().await;

        let result = LocalCache::open(&path).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }
}

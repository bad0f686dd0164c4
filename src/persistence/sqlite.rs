//! SQLite cache repository backed by an sqlx connection pool.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, warn};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};
use crate::persistence::CacheRepository;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Database row representation of a cache entry.
#[derive(Debug, FromRow)]
struct CacheEntryRow {
    key: String,
    value: String,
    /// Unix milliseconds
    expires_at: i64,
    revision: i64,
}

impl TryFrom<CacheEntryRow> for CacheEntry {
    type Error = CacheError;

    fn try_from(row: CacheEntryRow) -> std::result::Result<Self, Self::Error> {
        let expires_at = DateTime::<Utc>::from_timestamp_millis(row.expires_at).ok_or_else(|| {
            CacheError::Persistence(format!(
                "invalid expires_at {} for key '{}'",
                row.expires_at, row.key
            ))
        })?;

        let mut entry = CacheEntry::expiring_at(row.key, row.value, expires_at);
        entry.revision = u64::try_from(row.revision).unwrap_or(0);
        Ok(entry)
    }
}

fn revision_param(entry: &CacheEntry) -> i64 {
    i64::try_from(entry.revision).unwrap_or(i64::MAX)
}

/// SQLite implementation of [`CacheRepository`].
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens (creating if needed) the database at `url`.
    ///
    /// In-memory databases are pinned to a single connection that is never
    /// recycled, since every SQLite connection gets its own private memory
    /// database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to SQLite database at {}", url);

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:");

        let mut pool_options = SqlitePoolOptions::new().acquire_timeout(ACQUIRE_TIMEOUT);
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            warn!("Failed to connect to database: {}", e);
            CacheError::Persistence(format!("Failed to connect: {}", e))
        })?;

        info!("SQLite connection pool established");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the underlying pool.
    #[must_use]
    pub fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        info!("Closing database connection pool...");
        self.pool.close().await;
    }
}

#[async_trait]
impl CacheRepository for SqliteRepository {
    async fn load_all(&self) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query_as::<_, CacheEntryRow>(
            "SELECT key, value, expires_at, revision FROM cache_entries ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Loaded {} cache records", rows.len());
        rows.into_iter().map(CacheEntry::try_from).collect()
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        debug!("Persisting key '{}' at revision {}", entry.key, entry.revision);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at, revision)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at,
                revision = excluded.revision
            WHERE excluded.revision >= cache_entries.revision
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.expires_at.timestamp_millis())
        .bind(revision_param(entry))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_if_expired(&self, key: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = ? AND expires_at <= ?")
            .bind(key)
            .bind(expires_at.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl std::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRepository")
            .field("size", &self.pool.size())
            .field("num_idle", &self.pool.num_idle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    async fn memory_repo() -> SqliteRepository {
        let repo = SqliteRepository::connect("sqlite::memory:", 1).await.unwrap();
        repo.run_migrations().await.unwrap();
        repo
    }

    fn entry(key: &str, value: &str, revision: u64) -> CacheEntry {
        let mut entry = CacheEntry::new(key, value, 60);
        entry.revision = revision;
        entry
    }

    #[tokio::test]
    async fn test_upsert_and_load() {
        let repo = memory_repo().await;
        let stored = entry("a", "1", 1);

        repo.upsert(&stored).await.unwrap();
        let loaded = repo.load_all().await.unwrap();

        assert_eq!(loaded, vec![stored]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_key() {
        let repo = memory_repo().await;
        repo.upsert(&entry("a", "1", 1)).await.unwrap();
        repo.upsert(&entry("a", "2", 2)).await.unwrap();

        let loaded = repo.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, "2");
        assert_eq!(loaded[0].revision, 2);
    }

    #[tokio::test]
    async fn test_stale_revision_does_not_overwrite() {
        let repo = memory_repo().await;
        repo.upsert(&entry("a", "newer", 5)).await.unwrap();
        repo.upsert(&entry("a", "older", 3)).await.unwrap();

        let loaded = repo.load_all().await.unwrap();
        assert_eq!(loaded[0].value, "newer");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = memory_repo().await;
        repo.upsert(&entry("a", "1", 1)).await.unwrap();

        repo.delete("a").await.unwrap();
        repo.delete("a").await.unwrap();

        assert!(repo.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_if_expired_spares_newer_write() {
        let repo = memory_repo().await;
        let stale_expiry = Utc::now() - TimeDelta::seconds(10);
        repo.upsert(&entry("a", "fresh", 2)).await.unwrap();

        let removed = repo.delete_if_expired("a", stale_expiry).await.unwrap();
        assert!(!removed);
        assert_eq!(repo.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_if_expired_removes_matching_record() {
        let repo = memory_repo().await;
        let expired = CacheEntry::expiring_at("a", "old", Utc::now() - TimeDelta::seconds(10));
        repo.upsert(&expired).await.unwrap();

        let removed = repo
            .delete_if_expired("a", expired.expires_at)
            .await
            .unwrap();
        assert!(removed);
        assert!(repo.load_all().await.unwrap().is_empty());
    }
}

//! Repository trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::CacheEntry;
use crate::error::Result;

/// Durable store for cache entries, one record per key.
///
/// Writes carry the entry's `revision`; implementations must keep the record
/// with the highest revision when writes for the same key arrive out of order.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Reads every stored record, expired or not.
    async fn load_all(&self) -> Result<Vec<CacheEntry>>;

    /// Inserts or replaces the record for `entry.key`.
    async fn upsert(&self, entry: &CacheEntry) -> Result<()>;

    /// Deletes the record for `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes the record for `key` only if it expires no later than
    /// `expires_at`. Returns whether a record was removed.
    async fn delete_if_expired(&self, key: &str, expires_at: DateTime<Utc>) -> Result<bool>;
}

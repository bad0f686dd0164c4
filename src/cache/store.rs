//! Cache Store Module
//!
//! Main cache engine: an in-memory map with lazy expiry, written through to a
//! durable repository and announced to subscribers after every commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::broadcast::{BroadcastHub, Notification, Payload, SnapshotSource};
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};
use crate::persistence::CacheRepository;

/// Outcome of the startup load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Live records inserted into memory
    pub loaded: usize,
    /// Expired records deleted from durable storage
    pub purged: usize,
}

// == Cache Store ==
/// Concurrency-safe key/value store with TTL expiry and write-through.
///
/// Reads share the lock; writes hold it exclusively only while mutating the
/// map, never across the durable write or the broadcast enqueue. A write is
/// applied to the map after its durable write succeeds.
///
/// Expiry is lazy: there is no sweeper, so an expired entry that is never
/// read again stays resident until the process restarts. Memory therefore
/// grows with the number of distinct keys written, not with the number live.
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    repository: Arc<dyn CacheRepository>,
    hub: BroadcastHub,
    persist_timeout: Duration,
    /// Last revision handed out.
    revision: AtomicU64,
    stats: StatsRecorder,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `repository` - Durable store every set is written through to
    /// * `hub` - Queue committed writes are announced on
    /// * `persist_timeout` - Upper bound on a single durable write
    pub fn new(
        repository: Arc<dyn CacheRepository>,
        hub: BroadcastHub,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            repository,
            hub,
            persist_timeout,
            revision: AtomicU64::new(0),
            stats: StatsRecorder::default(),
        }
    }

    // == Get ==
    /// Returns the live entry for `key`.
    ///
    /// An entry found past its expiry is evicted from memory and `None` is
    /// returned. Its durable record is purged on a detached task, so the
    /// caller never waits on I/O.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => {
                    self.stats.record_miss();
                    return None;
                }
                Some(entry) if !entry.is_expired() => {
                    self.stats.record_hit();
                    return Some(entry.clone());
                }
                Some(_) => {}
            }
        }

        self.evict_expired(key).await;
        self.stats.record_miss();
        None
    }

    async fn evict_expired(&self, key: &str) {
        let evicted = {
            let mut entries = self.entries.write().await;
            // Re-check: a set may have refreshed the key between the locks.
            match entries.get(key) {
                Some(entry) if entry.is_expired() => entries.remove(key),
                _ => None,
            }
        };

        let Some(entry) = evicted else {
            return;
        };

        self.stats.record_expiration();
        debug!("Evicted expired key '{}'", key);

        let repository = Arc::clone(&self.repository);
        tokio::spawn(async move {
            if let Err(e) = repository
                .delete_if_expired(&entry.key, entry.expires_at)
                .await
            {
                warn!("Failed to purge expired key '{}': {}", entry.key, e);
            }
        });
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl_seconds`, overwriting any entry.
    ///
    /// The write is durable before this returns `Ok`, and it only becomes
    /// visible to `get` and snapshots once it is. If the durable write fails
    /// or exceeds the persist timeout, memory keeps its pre-write state and
    /// no notification is published.
    pub async fn set(&self, key: String, value: String, ttl_seconds: u64) -> Result<CacheEntry> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let mut entry = CacheEntry::new(key, value, ttl_seconds);
        entry.revision = self.revision.fetch_add(1, Ordering::Relaxed) + 1;

        // Memory only ever holds durable writes, so a failure leaves the
        // pre-write state in place and there is nothing to undo.
        if let Err(e) = self.persist(&entry).await {
            self.stats.record_persistence_failure();
            error!("Write-through for key '{}' failed: {}", entry.key, e);
            return Err(e);
        }

        if !self.commit(&entry).await {
            debug!(
                "Revision {} of '{}' superseded before commit",
                entry.revision, entry.key
            );
        }

        self.stats.record_write();
        debug!(
            "Stored key '{}' (revision {}, expires {})",
            entry.key, entry.revision, entry.expires_at
        );

        self.hub
            .publish(Notification::new(entry.key.clone(), entry.revision))
            .await;

        Ok(entry)
    }

    async fn persist(&self, entry: &CacheEntry) -> Result<()> {
        match tokio::time::timeout(self.persist_timeout, self.repository.upsert(entry)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Persistence(format!(
                "write of key '{}' timed out after {:?}",
                entry.key, self.persist_timeout
            ))),
        }
    }

    /// Makes a durable write visible to readers and snapshots.
    ///
    /// Returns `false` when a newer revision of the key is already resident,
    /// in which case the map is left alone.
    async fn commit(&self, entry: &CacheEntry) -> bool {
        let mut entries = self.entries.write().await;
        let superseded = entries
            .get(&entry.key)
            .is_some_and(|current| current.revision > entry.revision);
        if !superseded {
            entries.insert(entry.key.clone(), entry.clone());
        }
        !superseded
    }

    // == Load Initial ==
    /// Seeds the store from a durable snapshot. Call once, before serving.
    ///
    /// Live records go into memory; records already past their expiry are
    /// deleted from the repository and skipped.
    pub async fn load_initial(&self, records: Vec<CacheEntry>) -> Result<LoadReport> {
        let now = Utc::now();
        let max_revision = records.iter().map(|e| e.revision).max().unwrap_or(0);
        self.revision.fetch_max(max_revision, Ordering::Relaxed);

        let (live, expired): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|e| !e.is_expired_at(now));

        for entry in &expired {
            self.repository.delete(&entry.key).await?;
        }

        let report = LoadReport {
            loaded: live.len(),
            purged: expired.len(),
        };

        let mut entries = self.entries.write().await;
        for entry in live {
            entries.insert(entry.key.clone(), entry);
        }

        Ok(report)
    }

    /// Reads every durable record and hands it to [`load_initial`](Self::load_initial).
    pub async fn restore(&self) -> Result<LoadReport> {
        let records = self.repository.load_all().await?;
        let report = self.load_initial(records).await?;
        info!(
            "Restored {} entries from durable storage ({} expired records purged)",
            report.loaded, report.purged
        );
        Ok(report)
    }

    // == Snapshot ==
    /// Every live entry, keyed and ordered by key.
    pub async fn snapshot(&self) -> BTreeMap<String, CacheEntry> {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| (entry.key.clone(), entry.clone()))
            .collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let total_entries = self.entries.read().await.len();
        self.stats.snapshot(total_entries)
    }

    // == Length ==
    /// Number of entries resident in memory, including expired ones not yet read.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotSource for CacheStore {
    async fn render(&self, _notification: &Notification) -> Result<Payload> {
        let snapshot = self.snapshot().await;
        serde_json::to_string(&snapshot)
            .map(Payload::from)
            .map_err(|e| CacheError::Internal(format!("failed to serialize snapshot: {}", e)))
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("persist_timeout", &self.persist_timeout)
            .field("revision", &self.revision.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

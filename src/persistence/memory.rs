//! In-memory cache repository.
//!
//! Keeps records in a process-local map. Suitable for tests and for running
//! the server without a database; nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};
use crate::persistence::CacheRepository;

/// Process-local implementation of [`CacheRepository`].
///
/// Write failures and latency can be injected to exercise the store's
/// failure and timeout paths.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<HashMap<String, CacheEntry>>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let repo = Self::new();
        {
            let mut records = repo.records.write();
            for entry in entries {
                records.insert(entry.key.clone(), entry);
            }
        }
        repo
    }

    /// Makes every subsequent write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every subsequent write by `delay`.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.records.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    async fn before_write(&self) -> Result<()> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Persistence("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheRepository for MemoryRepository {
    async fn load_all(&self) -> Result<Vec<CacheEntry>> {
        let mut entries: Vec<CacheEntry> = self.records.read().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        self.before_write().await?;

        let mut records = self.records.write();
        let stale = records
            .get(&entry.key)
            .is_some_and(|current| current.revision > entry.revision);
        if !stale {
            records.insert(entry.key.clone(), entry.clone());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.before_write().await?;
        self.records.write().remove(key);
        Ok(())
    }

    async fn delete_if_expired(&self, key: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        self.before_write().await?;

        let mut records = self.records.write();
        match records.get(key) {
            Some(current) if current.expires_at <= expires_at => {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

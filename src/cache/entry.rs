//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with an absolute expiry.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A stored key/value pair with its expiration timestamp.
///
/// Serializes as `{"key", "value", "expiresAt"}`. Timestamps are kept at
/// millisecond precision so they survive a round trip through the durable
/// store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    /// Write sequence number, assigned by the store. Never sent to clients.
    #[serde(skip)]
    pub revision: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl_seconds` from now.
    ///
    /// TTLs too large to represent saturate to the maximum timestamp.
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl_seconds: u64) -> Self {
        let now = now_ms();
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .trunc_subsecs(3);

        Self::expiring_at(key, value, expires_at)
    }

    /// Creates an entry with an explicit expiry, e.g. when loading from storage.
    pub fn expiring_at(
        key: impl Into<String>,
        value: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires_at,
            revision: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches `expires_at`, so a
    /// zero TTL produces an entry that is never observable.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Returns the remaining lifetime in whole seconds, zero once expired.
    pub fn ttl_remaining(&self) -> u64 {
        let remaining = self.expires_at - Utc::now();
        u64::try_from(remaining.num_seconds()).unwrap_or(0)
    }
}

// == Utility Functions ==
/// Current time truncated to the precision the durable store keeps.
pub fn now_ms() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

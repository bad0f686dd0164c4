//! Cache Module
//!
//! Provides the in-memory store with lazy TTL expiry and write-through persistence.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::{now_ms, CacheEntry};
pub use stats::CacheStats;
pub use store::{CacheStore, LoadReport};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

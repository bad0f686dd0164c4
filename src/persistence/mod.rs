//! Persistence Module
//!
//! Durable backing storage the cache writes through to and restores from.
//!
//! # Implementations
//! - [`SqliteRepository`] - sqlx-backed SQLite store used by the server
//! - [`MemoryRepository`] - process-local store for tests and throwaway runs

mod memory;
mod repository;
mod sqlite;

pub use memory::MemoryRepository;
pub use repository::CacheRepository;
pub use sqlite::SqliteRepository;

//! Live Cache - a key-value cache server with live change feeds
//!
//! Entries expire lazily after a per-entry TTL, every write is committed to a
//! durable store before it is acknowledged, and each committed write pushes
//! the full cache state to connected WebSocket subscribers.

pub mod api;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_fanout_task;

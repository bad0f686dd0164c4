//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies. Cache entries
//! themselves are returned as [`CacheEntry`](crate::cache::CacheEntry).

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::SetRequest;
pub use responses::{HealthResponse, StatsResponse};

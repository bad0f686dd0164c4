//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Request body could not be decoded or failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Durable read or write failed (or timed out)
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Persistence(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for CacheError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CacheError::Persistence(format!("migration failed: {}", err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        match self {
            // Clients expect a bare JSON string here.
            CacheError::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json("Key not found")).into_response()
            }
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            CacheError::Persistence(msg) | CacheError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": msg })),
            )
                .into_response(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;

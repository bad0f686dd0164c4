//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::broadcast::{BroadcastHub, SubscriberRegistry};
use crate::cache::{CacheEntry, CacheStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, SetRequest, StatsResponse};
use crate::persistence::CacheRepository;
use crate::tasks::spawn_fanout_task;

/// Application state shared across all handlers.
///
/// The cache store and the subscriber registry are separate, independently
/// locked containers; handlers touch one or the other, never both at once.
#[derive(Clone)]
pub struct AppState {
    /// Cache contents, written through to durable storage
    pub cache: Arc<CacheStore>,
    /// Live WebSocket subscribers
    pub subscribers: Arc<SubscriberRegistry>,
    /// Outbound queue capacity given to each new subscriber
    pub subscriber_buffer: usize,
}

impl AppState {
    /// Creates a new AppState from already-built parts.
    pub fn new(
        cache: Arc<CacheStore>,
        subscribers: Arc<SubscriberRegistry>,
        subscriber_buffer: usize,
    ) -> Self {
        Self {
            cache,
            subscribers,
            subscriber_buffer,
        }
    }

    /// Wires the store, registry and broadcast queue together, restores the
    /// cache from `repository` and starts the fan-out task.
    ///
    /// Returns the state and the fan-out task handle so the caller can abort
    /// it on shutdown. Fails if the initial load fails.
    pub async fn bootstrap(
        repository: Arc<dyn CacheRepository>,
        config: &Config,
    ) -> Result<(Self, JoinHandle<()>)> {
        let subscribers = Arc::new(SubscriberRegistry::new());
        let (hub, notifications) =
            BroadcastHub::channel(config.broadcast_buffer, config.enqueue_timeout());
        let cache = Arc::new(CacheStore::new(repository, hub, config.persist_timeout()));

        cache.restore().await?;

        let fanout = spawn_fanout_task(notifications, Arc::clone(&cache), Arc::clone(&subscribers));
        Ok((
            Self::new(cache, subscribers, config.subscriber_buffer),
            fanout,
        ))
    }
}

/// Handler for POST /cache
///
/// Stores a key-value pair for `duration` seconds and returns the stored
/// entry. The body is decoded regardless of its declared content type; any
/// decode failure is a 400.
pub async fn set_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<CacheEntry>> {
    let req: SetRequest = serde_json::from_slice(&body)
        .map_err(|e| CacheError::InvalidRequest(format!("Invalid request body: {}", e)))?;

    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let entry = state.cache.set(req.key, req.value, req.duration).await?;
    Ok(Json(entry))
}

/// Handler for GET /cache/:key
///
/// Returns the live entry, or 404 if the key is absent or expired.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CacheEntry>> {
    match state.cache.get(&key).await {
        Some(entry) => Ok(Json(entry)),
        None => {
            debug!("Cache miss for '{}'", key);
            Err(CacheError::NotFound(key))
        }
    }
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;
    Json(StatsResponse::new(&stats, state.subscribers.len()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

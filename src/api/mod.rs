//! API Module
//!
//! HTTP handlers and routing for the cache server.
//!
//! # Endpoints
//! - `GET /cache/:key` - Retrieve a live entry
//! - `POST /cache` - Store a key-value pair with a duration in seconds
//! - `GET /ws` - WebSocket feed of full cache snapshots
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;
pub mod ws;

pub use handlers::*;
pub use routes::create_router;
pub use ws::ws_handler;

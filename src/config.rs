//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// sqlx connection string for the durable store
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub database_max_connections: u32,
    /// How long a write-through may take before the set fails (milliseconds)
    pub persist_timeout_ms: u64,
    /// Capacity of the notification queue feeding the fan-out task
    pub broadcast_buffer: usize,
    /// How long a writer waits on a full notification queue (milliseconds)
    pub enqueue_timeout_ms: u64,
    /// Capacity of each subscriber's outbound queue
    pub subscriber_buffer: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `DATABASE_URL` - Durable store location (default: sqlite://live_cache.db)
    /// - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 5)
    /// - `PERSIST_TIMEOUT_MS` - Write-through timeout (default: 5000)
    /// - `BROADCAST_BUFFER` - Pending notifications before writers wait (default: 64)
    /// - `ENQUEUE_TIMEOUT_MS` - Max wait on a full notification queue (default: 1000)
    /// - `SUBSCRIBER_BUFFER` - Per-subscriber pending snapshots (default: 32)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            persist_timeout_ms: env_or("PERSIST_TIMEOUT_MS", defaults.persist_timeout_ms),
            broadcast_buffer: env_or("BROADCAST_BUFFER", defaults.broadcast_buffer).max(1),
            enqueue_timeout_ms: env_or("ENQUEUE_TIMEOUT_MS", defaults.enqueue_timeout_ms),
            subscriber_buffer: env_or("SUBSCRIBER_BUFFER", defaults.subscriber_buffer).max(1),
        }
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            database_url: "sqlite://live_cache.db".to_string(),
            database_max_connections: 5,
            persist_timeout_ms: 5000,
            broadcast_buffer: 64,
            enqueue_timeout_ms: 1000,
            subscriber_buffer: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.database_url, "sqlite://live_cache.db");
        assert_eq!(config.broadcast_buffer, 64);
        assert_eq!(config.subscriber_buffer, 32);
        assert_eq!(config.persist_timeout(), Duration::from_secs(5));
        assert_eq!(config.enqueue_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("SERVER_PORT");
        env::remove_var("DATABASE_URL");
        env::remove_var("BROADCAST_BUFFER");
        env::remove_var("PERSIST_TIMEOUT_MS");

        let config = Config::from_env();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.database_url, "sqlite://live_cache.db");
        assert_eq!(config.broadcast_buffer, 64);
        assert_eq!(config.persist_timeout_ms, 5000);
    }

    #[test]
    fn test_env_or_ignores_unparseable_values() {
        env::set_var("LIVE_CACHE_TEST_BAD_NUMBER", "not-a-number");
        assert_eq!(env_or("LIVE_CACHE_TEST_BAD_NUMBER", 7u32), 7);
        env::remove_var("LIVE_CACHE_TEST_BAD_NUMBER");
    }
}

//! Live Cache - a key-value cache server with live change feeds
//!
//! Serves cache reads and writes over HTTP and pushes the full cache state to
//! WebSocket subscribers after every committed write.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_cache::api::create_router;
use live_cache::persistence::SqliteRepository;
use live_cache::{AppState, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the database and run migrations
/// 4. Restore live entries, purging expired records
/// 5. Start the broadcast fan-out task
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
///
/// Any failure before the listener is bound aborts startup.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Live Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, database={}, broadcast_buffer={}, subscriber_buffer={}",
        config.server_port, config.database_url, config.broadcast_buffer, config.subscriber_buffer
    );

    let repository = SqliteRepository::connect(&config.database_url, config.database_max_connections)
        .await
        .context("failed to open database")?;
    repository
        .run_migrations()
        .await
        .context("failed to migrate database")?;
    let repository = Arc::new(repository);

    let (state, fanout_handle) = AppState::bootstrap(repository.clone(), &config)
        .await
        .context("failed to load cache from database")?;
    info!("Cache store initialized; fan-out task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fanout_handle))
        .await
        .context("server error")?;

    repository.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the fan-out task and allows graceful shutdown.
async fn shutdown_signal(fanout_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    fanout_handle.abort();
    warn!("Fan-out task aborted");
}

//! Integration Tests for durable storage
//!
//! Writes through a SQLite file, drops everything, and restores from the same
//! file the way a restarted process would.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use live_cache::cache::CacheEntry;
use live_cache::persistence::{CacheRepository, SqliteRepository};
use live_cache::{AppState, Config};
use tempfile::TempDir;

async fn open(dir: &TempDir) -> Arc<SqliteRepository> {
    let url = format!("sqlite://{}", dir.path().join("cache.db").display());
    let repo = SqliteRepository::connect(&url, 2).await.unwrap();
    repo.run_migrations().await.unwrap();
    Arc::new(repo)
}

#[tokio::test]
async fn test_restart_round_trip() {
    let dir = TempDir::new().unwrap();

    let stored = {
        let repo = open(&dir).await;
        let (state, fanout) = AppState::bootstrap(repo.clone(), &Config::default())
            .await
            .unwrap();
        let stored = state
            .cache
            .set("a".into(), "1".into(), 60)
            .await
            .unwrap();
        fanout.abort();
        repo.close().await;
        stored
    };

    let repo = open(&dir).await;
    let (state, fanout) = AppState::bootstrap(repo.clone(), &Config::default())
        .await
        .unwrap();

    let restored = state.cache.get("a").await.expect("entry should survive restart");
    assert_eq!(restored.value, stored.value);
    assert_eq!(restored.expires_at, stored.expires_at);

    fanout.abort();
}

#[tokio::test]
async fn test_startup_purges_expired_records() {
    let dir = TempDir::new().unwrap();

    {
        let repo = open(&dir).await;
        repo.upsert(&CacheEntry::new("live", "1", 60)).await.unwrap();
        repo.upsert(&CacheEntry::expiring_at(
            "stale",
            "0",
            Utc::now() - TimeDelta::seconds(30),
        ))
        .await
        .unwrap();
        repo.close().await;
    }

    let repo = open(&dir).await;
    let (state, fanout) = AppState::bootstrap(repo.clone(), &Config::default())
        .await
        .unwrap();

    assert!(state.cache.get("live").await.is_some());
    assert!(state.cache.get("stale").await.is_none());
    assert_eq!(state.cache.len().await, 1);

    let keys: Vec<String> = repo
        .load_all()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec!["live"]);

    fanout.abort();
}

#[tokio::test]
async fn test_overwrite_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let repo = open(&dir).await;
        let (state, fanout) = AppState::bootstrap(repo.clone(), &Config::default())
            .await
            .unwrap();
        state.cache.set("k".into(), "first".into(), 60).await.unwrap();
        state.cache.set("k".into(), "second".into(), 60).await.unwrap();
        fanout.abort();
        repo.close().await;
    }

    let repo = open(&dir).await;
    let (state, fanout) = AppState::bootstrap(repo.clone(), &Config::default())
        .await
        .unwrap();

    assert_eq!(state.cache.get("k").await.unwrap().value, "second");

    // Writes after a restart must still win over the restored record.
    state.cache.set("k".into(), "third".into(), 60).await.unwrap();
    let records = repo.load_all().await.unwrap();
    assert_eq!(records[0].value, "third");

    fanout.abort();
}

#[tokio::test]
async fn test_expired_read_purges_durable_record() {
    let dir = TempDir::new().unwrap();
    let repo = open(&dir).await;
    let (state, fanout) = AppState::bootstrap(repo.clone(), &Config::default())
        .await
        .unwrap();

    state.cache.set("short".into(), "v".into(), 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(state.cache.get("short").await.is_none());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(repo.load_all().await.unwrap().is_empty());

    fanout.abort();
}

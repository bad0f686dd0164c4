//! Broadcast Fan-out Task
//!
//! The single consumer of the notification queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{deliver, Notification, SnapshotSource, SubscriberRegistry};

/// Spawns the task that turns notifications into subscriber pushes.
///
/// Notifications are handled one at a time in the order they were queued.
/// For each one the task renders a payload from `source` and delivers it to
/// every subscriber registered at that moment. The task only ends on its
/// own once every [`BroadcastHub`](crate::broadcast::BroadcastHub) clone is
/// dropped. When `source` is the store that owns the hub, as in
/// `AppState::bootstrap`, that never happens and the task runs until the
/// returned handle is aborted.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let (hub, notifications) = BroadcastHub::channel(64, Duration::from_secs(1));
/// let store = Arc::new(CacheStore::new(repository, hub, Duration::from_secs(5)));
/// let fanout_handle = spawn_fanout_task(notifications, store.clone(), registry.clone());
/// // Later, during shutdown:
/// fanout_handle.abort();
/// ```
pub fn spawn_fanout_task<S>(
    mut notifications: mpsc::Receiver<Notification>,
    source: Arc<S>,
    registry: Arc<SubscriberRegistry>,
) -> JoinHandle<()>
where
    S: SnapshotSource + ?Sized + 'static,
{
    tokio::spawn(async move {
        info!("Starting broadcast fan-out task");

        while let Some(notification) = notifications.recv().await {
            if registry.is_empty() {
                debug!(
                    "No subscribers; skipping push for '{}' (revision {})",
                    notification.key, notification.revision
                );
                continue;
            }

            let payload = match source.render(&notification).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to render push for '{}': {}", notification.key, e);
                    continue;
                }
            };

            let delivered = deliver(&registry, &payload);
            debug!(
                "Pushed revision {} to {} subscribers",
                notification.revision, delivered
            );
        }

        info!("Notification queue closed; fan-out task exiting");
    })
}

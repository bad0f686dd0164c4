//! Broadcast Hub Module
//!
//! Writer-side notification queue and the fan-out step run by the consumer.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broadcast::{Payload, SubscriberRegistry};
use crate::error::Result;

// == Notification ==
/// A committed write that subscribers should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Key that was written
    pub key: String,
    /// Store revision of the write
    pub revision: u64,
}

impl Notification {
    pub fn new(key: impl Into<String>, revision: u64) -> Self {
        Self {
            key: key.into(),
            revision,
        }
    }
}

/// Renders the payload pushed for a notification.
///
/// The cache store renders its full live contents; a source that renders
/// per-write deltas can be swapped in without touching the queue.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn render(&self, notification: &Notification) -> Result<Payload>;
}

/// Result of [`BroadcastHub::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Queued,
    /// Queue stayed full for the whole enqueue timeout; notification dropped.
    TimedOut,
    /// Fan-out task has stopped; notification dropped.
    Closed,
}

// == Broadcast Hub ==
/// Sending half of the notification queue.
///
/// The queue is bounded. When it is full a writer waits up to
/// `enqueue_timeout` for the fan-out task to make room, then drops the
/// notification rather than stalling the write path indefinitely.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: mpsc::Sender<Notification>,
    enqueue_timeout: Duration,
}

impl BroadcastHub {
    /// Creates a hub and the receiver the fan-out task will drain.
    pub fn channel(
        capacity: usize,
        enqueue_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, enqueue_timeout }, rx)
    }

    // == Publish ==
    /// Enqueues `notification`, waiting at most the enqueue timeout.
    pub async fn publish(&self, notification: Notification) -> PublishOutcome {
        let key = notification.key.clone();
        match tokio::time::timeout(self.enqueue_timeout, self.tx.send(notification)).await {
            Ok(Ok(())) => PublishOutcome::Queued,
            Ok(Err(_)) => {
                warn!("Fan-out task is not running; dropping notification for '{}'", key);
                PublishOutcome::Closed
            }
            Err(_) => {
                warn!(
                    "Notification queue full for {:?}; dropping notification for '{}'",
                    self.enqueue_timeout, key
                );
                PublishOutcome::TimedOut
            }
        }
    }

    /// Number of notifications waiting for the fan-out task.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

// == Deliver ==
/// Pushes `payload` to every currently registered subscriber.
///
/// Subscribers whose queue is full or closed are unregistered; delivery to
/// the rest continues. Returns the number of successful deliveries.
pub fn deliver(registry: &SubscriberRegistry, payload: &Payload) -> usize {
    let mut delivered = 0;
    for subscriber in registry.snapshot() {
        match subscriber.try_deliver(payload) {
            Ok(()) => delivered += 1,
            Err(failure) => {
                debug!(
                    "Delivery to {} failed ({:?}); unregistering",
                    subscriber.id(),
                    failure
                );
                registry.remove(subscriber.id());
            }
        }
    }
    delivered
}

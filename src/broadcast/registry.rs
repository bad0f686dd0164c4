//! Subscriber Registry Module
//!
//! Tracks live subscriber connections and their outbound queues.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

/// Serialized message pushed to subscribers, shared across all of them.
pub type Payload = Arc<str>;

// == Subscriber Id ==
/// Per-connection identity. Ids increase monotonically and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a push to a subscriber was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// Outbound queue is at capacity; the connection is not keeping up.
    QueueFull,
    /// Receiving side is gone; the connection has closed.
    Closed,
}

// == Subscriber ==
/// A registered connection and the queue its writer task drains.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    outbound: mpsc::Sender<Payload>,
}

impl Subscriber {
    pub fn new(id: SubscriberId, outbound: mpsc::Sender<Payload>) -> Self {
        Self { id, outbound }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queues `payload` without waiting.
    pub fn try_deliver(&self, payload: &Payload) -> Result<(), DeliveryFailure> {
        self.outbound
            .try_send(Arc::clone(payload))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => DeliveryFailure::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
            })
    }
}

// == Subscriber Registry ==
/// Set of live subscribers, ordered by registration.
///
/// Guarded by its own lock, independent of the cache store's. Critical
/// sections never await, so accept/close paths never stall each other or
/// the fan-out task for longer than a map operation.
#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh subscriber id.
    pub fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // == Add ==
    /// Registers `subscriber`. Returns false if its id is already registered.
    pub fn add(&self, subscriber: Subscriber) -> bool {
        let id = subscriber.id();
        let mut subscribers = self.subscribers.write();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, subscriber);
        debug!("Subscriber {} registered ({} live)", id, subscribers.len());
        true
    }

    /// Creates a subscriber with a bounded outbound queue and registers it.
    ///
    /// Returns the new id and the receiving half of the queue.
    pub fn register(&self, capacity: usize) -> (SubscriberId, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.next_id();
        self.add(Subscriber::new(id, tx));
        (id, rx)
    }

    // == Remove ==
    /// Unregisters `id`. Removing an unknown or already-removed id is a no-op.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let removed = subscribers.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} unregistered ({} live)", id, subscribers.len());
        }
        removed
    }

    // == Snapshot ==
    /// Copies the current membership. Later adds and removes do not affect
    /// the returned list.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let registry = SubscriberRegistry::new();
        let (id, _rx) = registry.register(4);

        assert_eq!(registry.len(), 1);
        assert!(registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (id, _rx) = registry.register(4);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(!registry.remove(SubscriberId(999)));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let registry = SubscriberRegistry::new();
        let (first, _rx1) = registry.register(1);
        registry.remove(first);
        let (second, _rx2) = registry.register(1);

        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let registry = SubscriberRegistry::new();
        let id = registry.next_id();
        let (tx, _rx) = mpsc::channel(1);

        assert!(registry.add(Subscriber::new(id, tx.clone())));
        assert!(!registry.add(Subscriber::new(id, tx)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = registry.register(1);
        let (b, _rx_b) = registry.register(1);

        let snapshot = registry.snapshot();
        registry.remove(a);
        let (_c, _rx_c) = registry.register(1);

        let ids: Vec<SubscriberId> = snapshot.iter().map(Subscriber::id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_try_deliver_reports_full_and_closed() {
        let registry = SubscriberRegistry::new();
        let (_id, rx) = registry.register(1);
        let subscriber = registry.snapshot().remove(0);
        let payload: Payload = Arc::from("{}");

        assert_eq!(subscriber.try_deliver(&payload), Ok(()));
        assert_eq!(
            subscriber.try_deliver(&payload),
            Err(DeliveryFailure::QueueFull)
        );

        drop(rx);
        assert_eq!(subscriber.try_deliver(&payload), Err(DeliveryFailure::Closed));
    }

    #[test]
    fn test_concurrent_add_remove() {
        let registry = Arc::new(SubscriberRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let (id, _rx) = registry.register(1);
                        let _ = registry.snapshot();
                        assert!(registry.remove(id));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}

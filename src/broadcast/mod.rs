//! Broadcast Module
//!
//! Pushes the cache state to live subscribers after every committed write.
//!
//! # Flow
//! 1. `CacheStore::set` commits a write and calls [`BroadcastHub::publish`]
//! 2. The fan-out task (see `tasks::spawn_fanout_task`) drains notifications in
//!    FIFO order, renders one payload per notification from a
//!    [`SnapshotSource`] and hands it to [`deliver`]
//! 3. [`deliver`] pushes to every subscriber in a [`SubscriberRegistry`]
//!    snapshot, unregistering the ones that cannot accept it
//!
//! The payload is rendered when the notification is dequeued, so a subscriber
//! may see writes that landed after the one that triggered the push. The last
//! push always reflects the newest state.

mod hub;
mod registry;

pub use hub::{deliver, BroadcastHub, Notification, PublishOutcome, SnapshotSource};
pub use registry::{DeliveryFailure, Payload, Subscriber, SubscriberId, SubscriberRegistry};

//! Background Tasks Module
//!
//! Contains the long-lived tasks that run alongside request handling.
//!
//! # Tasks
//! - Fan-out: drains the broadcast queue and pushes snapshots to subscribers

mod fanout;

pub use fanout::spawn_fanout_task;

//! Broker — durable pub/sub behind an object-safe trait.

pub mod client;
pub mod fake;
pub mod nats;

pub use client::{Acker, Broker, BrokerError, Delivery, DurableSubscription};
pub use fake::{MemoryBroker, MemoryBrokerConfig};
pub use nats::{NatsBroker, StreamSettings};

use std::time::Duration;

/// Subject for ban actions published by the control plane.
pub const BAN_SUBJECT: &str = "bans.ban";

/// Subject for unban actions.
pub const UNBAN_SUBJECT: &str = "bans.unban";

/// Retention and dedup settings for the normalized-event stream.
pub fn events_stream(name: &str) -> StreamSettings {
    StreamSettings {
        name: name.to_string(),
        subjects: vec!["events.>".to_string()],
        max_age: Duration::from_secs(24 * 60 * 60),
        max_bytes: 1024 * 1024 * 1024,
        dedup_window: Duration::from_secs(60 * 60),
    }
}

/// Retention settings for the ban-action stream. Ban decisions are
/// kept a week so late consumers can rebuild their block lists.
pub fn bans_stream(name: &str) -> StreamSettings {
    StreamSettings {
        name: name.to_string(),
        subjects: vec!["bans.>".to_string()],
        max_age: Duration::from_secs(7 * 24 * 60 * 60),
        max_bytes: -1,
        dedup_window: Duration::from_secs(60 * 60),
    }
}

//! Wall-clock time and identifiers for new entities.

use cardbox_engine::{EntityId, Timestamp};

/// Current time in milliseconds since the Unix epoch.
pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

/// A fresh random entity identifier.
pub fn new_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}

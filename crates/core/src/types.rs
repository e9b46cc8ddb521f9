//! Identifier and timestamp aliases shared by every crate.

/// Store keys are opaque, time-ordered UUIDs assigned at creation.
pub type EntityId = uuid::Uuid;

/// Party identifiers are issued by the external identity provider.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh entity key.
pub fn new_entity_id() -> EntityId {
    uuid::Uuid::now_v7()
}

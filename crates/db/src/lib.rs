//! Entity store contract, in-memory store, models, and repositories.

use std::sync::Arc;

pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use memory::{MemoryStore, StoreFailure};
pub use store::{Conditional, EntityStore, FieldMatch, Record, StoreError};

/// Shared handle to the store every client talks to.
pub type DbStore = Arc<dyn EntityStore>;

/// Create an in-memory store whose change feed buffers `capacity` events.
pub fn create_memory_store(capacity: usize) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_capacity(capacity))
}

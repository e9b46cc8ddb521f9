//! In-memory [`EntityStore`].
//!
//! Every party client sharing one `Arc<MemoryStore>` observes the same
//! records. Writes to a single key are atomic under the collection lock,
//! so [`EntityStore::patch_where`] and [`EntityStore::delete_where`] are
//! true single-key compare-and-write here. Failure injection lets tests
//! exercise the `OperationFailed` paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tradeit_core::types::EntityId;
use tradeit_events::{ChangeEvent, ChangeFeed, ChangeKind, ChangePredicate, Subscription};

use crate::store::{Conditional, EntityStore, FieldMatch, Record, StoreError};

/// Types of failures that can be simulated.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreFailure {
    /// Fail all operations.
    All,
    /// Fail only reads and queries.
    Reads,
    /// Fail only writes.
    Writes,
    /// Fail any operation touching this key.
    OnKey(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Access {
    Read,
    Write,
}

type Collection = BTreeMap<EntityId, Record>;

/// Shared in-process store. Records within a collection are returned in key
/// order, which for v7 keys is creation order.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    feed: ChangeFeed,
    failure: RwLock<Option<StoreFailure>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_feed(ChangeFeed::default())
    }

    /// Create a store whose change feed buffers `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_feed(ChangeFeed::new(capacity))
    }

    fn with_feed(feed: ChangeFeed) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            feed,
            failure: RwLock::new(None),
            writes: AtomicU64::new(0),
        }
    }

    /// Start failing calls according to `failure`.
    pub async fn set_failure(&self, failure: StoreFailure) {
        *self.failure.write().await = Some(failure);
    }

    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Number of successful writes applied so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn check(&self, access: Access, key: Option<EntityId>) -> Result<(), StoreError> {
        let failing = match &*self.failure.read().await {
            None => false,
            Some(StoreFailure::All) => true,
            Some(StoreFailure::Reads) => access == Access::Read,
            Some(StoreFailure::Writes) => access == Access::Write,
            Some(StoreFailure::OnKey(k)) => key == Some(*k),
        };
        if failing {
            Err(StoreError::Unavailable(format!(
                "simulated {} failure",
                match access {
                    Access::Read => "read",
                    Access::Write => "write",
                }
            )))
        } else {
            Ok(())
        }
    }

    fn applied(&self, event: ChangeEvent) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.feed.publish(event);
    }

    fn merge(record: &mut Record, fields: Record) {
        for (name, value) in fields {
            if value.is_null() {
                record.remove(&name);
            } else {
                record.insert(name, value);
            }
        }
    }

    fn not_found(collection: &str, key: EntityId) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            key,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn put(&self, collection: &str, key: EntityId, record: Record) -> Result<(), StoreError> {
        self.check(Access::Write, Some(key)).await?;
        let mut collections = self.collections.write().await;
        let snapshot = Value::Object(record.clone());
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key, record);
        self.applied(ChangeEvent::new(collection, key, ChangeKind::Put).with_record(snapshot));
        tracing::trace!(collection, %key, "put");
        Ok(())
    }

    async fn patch(&self, collection: &str, key: EntityId, fields: Record) -> Result<Record, StoreError> {
        self.check(Access::Write, Some(key)).await?;
        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(&key))
            .ok_or_else(|| Self::not_found(collection, key))?;

        let names: Vec<String> = fields.keys().cloned().collect();
        Self::merge(record, fields);
        let updated = record.clone();

        self.applied(
            ChangeEvent::new(collection, key, ChangeKind::Patched)
                .with_fields(names.iter().cloned())
                .with_record(Value::Object(updated.clone())),
        );
        tracing::trace!(collection, %key, fields = ?names, "patch");
        Ok(updated)
    }

    async fn get(&self, collection: &str, key: EntityId) -> Result<Option<Record>, StoreError> {
        self.check(Access::Read, Some(key)).await?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(&key)).cloned())
    }

    async fn delete(&self, collection: &str, key: EntityId) -> Result<(), StoreError> {
        self.check(Access::Write, Some(key)).await?;
        let mut collections = self.collections.write().await;
        let removed = collections.get_mut(collection).and_then(|c| c.remove(&key));
        if removed.is_some() {
            self.applied(ChangeEvent::new(collection, key, ChangeKind::Deleted));
            tracing::trace!(collection, %key, "delete");
        }
        Ok(())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        self.check(Access::Read, None).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|r| r.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.check(Access::Read, None).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn subscribe(&self, collection: &str, predicate: ChangePredicate) -> Subscription {
        self.feed.subscribe(collection, move |event| predicate(event))
    }

    async fn patch_where(
        &self,
        collection: &str,
        key: EntityId,
        expect: &FieldMatch,
        fields: Record,
    ) -> Result<Conditional<Record>, StoreError> {
        self.check(Access::Write, Some(key)).await?;
        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(&key))
            .ok_or_else(|| Self::not_found(collection, key))?;

        if !expect.matches(record) {
            return Ok(Conditional::PreconditionFailed(record.clone()));
        }

        let names: Vec<String> = fields.keys().cloned().collect();
        Self::merge(record, fields);
        let updated = record.clone();

        self.applied(
            ChangeEvent::new(collection, key, ChangeKind::Patched)
                .with_fields(names.iter().cloned())
                .with_record(Value::Object(updated.clone())),
        );
        tracing::trace!(collection, %key, fields = ?names, "conditional patch");
        Ok(Conditional::Applied(updated))
    }

    async fn delete_where(
        &self,
        collection: &str,
        key: EntityId,
        expect: &FieldMatch,
    ) -> Result<Conditional<Record>, StoreError> {
        self.check(Access::Write, Some(key)).await?;
        let mut collections = self.collections.write().await;
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, key))?;
        let current = records
            .get(&key)
            .ok_or_else(|| Self::not_found(collection, key))?;

        if !expect.matches(current) {
            return Ok(Conditional::PreconditionFailed(current.clone()));
        }

        let removed = records
            .remove(&key)
            .ok_or_else(|| Self::not_found(collection, key))?;
        self.applied(ChangeEvent::new(collection, key, ChangeKind::Deleted));
        tracing::trace!(collection, %key, "conditional delete");
        Ok(Conditional::Applied(removed))
    }
}

//! The entity store contract consumed by the repositories.
//!
//! Records are flat JSON objects keyed by [`EntityId`] inside named
//! collections. Writes to different keys are independent: there is no
//! multi-key transaction. The only conditional writes offered are the
//! single-key [`EntityStore::patch_where`] and [`EntityStore::delete_where`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tradeit_core::types::EntityId;
use tradeit_events::{ChangePredicate, Subscription};

/// A stored record: a flat map of field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Storage-level failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the call.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A patch or conditional write targeted a key that does not exist.
    #[error("Record not found: {collection}/{key}")]
    NotFound { collection: String, key: EntityId },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value is not a JSON object.
    #[error("Corrupt record in {collection}: {reason}")]
    Corrupt { collection: String, reason: String },
}

/// Single-field equality precondition for a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub field: String,
    pub value: Value,
}

impl FieldMatch {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `record` currently holds the expected value.
    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(&self.value)
    }
}

/// Outcome of a conditional write. Both arms carry the record: the
/// post-write state when applied, the state that failed the check otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditional<T> {
    Applied(T),
    PreconditionFailed(T),
}

impl<T> Conditional<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Conditional::Applied(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Conditional::Applied(v) | Conditional::PreconditionFailed(v) => v,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Conditional<U>, E> {
        Ok(match self {
            Conditional::Applied(v) => Conditional::Applied(f(v)?),
            Conditional::PreconditionFailed(v) => Conditional::PreconditionFailed(f(v)?),
        })
    }
}

/// Generic keyed-record storage with change notifications.
///
/// Every method is an asynchronous round trip. Implementations must give
/// read-after-own-write consistency; nothing stronger is assumed.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Write a full record, replacing any existing one.
    async fn put(&self, collection: &str, key: EntityId, record: Record) -> Result<(), StoreError>;

    /// Merge `fields` into an existing record and return the result. A
    /// `null` value removes the field. Fails with `NotFound` if absent.
    async fn patch(&self, collection: &str, key: EntityId, fields: Record) -> Result<Record, StoreError>;

    async fn get(&self, collection: &str, key: EntityId) -> Result<Option<Record>, StoreError>;

    /// Remove a record. Removing an absent key is not an error.
    async fn delete(&self, collection: &str, key: EntityId) -> Result<(), StoreError>;

    /// Point-in-time snapshot of every record whose `field` equals `value`.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError>;

    /// Point-in-time snapshot of a whole collection.
    async fn scan(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Change events for `collection` that satisfy `predicate`.
    fn subscribe(&self, collection: &str, predicate: ChangePredicate) -> Subscription;

    /// Patch only if `expect` holds on the current record.
    ///
    /// The default is read-check-write and therefore not atomic. Stores that
    /// can update a single key atomically should override it.
    async fn patch_where(
        &self,
        collection: &str,
        key: EntityId,
        expect: &FieldMatch,
        fields: Record,
    ) -> Result<Conditional<Record>, StoreError> {
        let current = self
            .get(collection, key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key,
            })?;
        if !expect.matches(&current) {
            return Ok(Conditional::PreconditionFailed(current));
        }
        let updated = self.patch(collection, key, fields).await?;
        Ok(Conditional::Applied(updated))
    }

    /// Delete only if `expect` holds on the current record. Same atomicity
    /// caveat as [`patch_where`](Self::patch_where).
    async fn delete_where(
        &self,
        collection: &str,
        key: EntityId,
        expect: &FieldMatch,
    ) -> Result<Conditional<Record>, StoreError> {
        let current = self
            .get(collection, key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                key,
            })?;
        if !expect.matches(&current) {
            return Ok(Conditional::PreconditionFailed(current));
        }
        self.delete(collection, key).await?;
        Ok(Conditional::Applied(current))
    }
}

// ---------------------------------------------------------------------------
// Record codec
// ---------------------------------------------------------------------------

/// Serialize a model into a store record.
pub fn encode<T: Serialize>(collection: &str, value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Corrupt {
            collection: collection.to_string(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

/// Deserialize a store record into a model.
pub fn decode<T: DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Build a record from `(field, value)` pairs.
pub fn fields<I, K>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_match_compares_exact_value() {
        let record = fields([("status", json!("available"))]);
        assert!(FieldMatch::new("status", "available").matches(&record));
        assert!(!FieldMatch::new("status", "pending").matches(&record));
        assert!(!FieldMatch::new("missing", "x").matches(&record));
    }

    #[test]
    fn conditional_maps_both_arms() {
        let applied: Conditional<i32> = Conditional::Applied(2);
        let mapped = applied.try_map(|v| Ok::<_, ()>(v * 10)).unwrap();
        assert_eq!(mapped, Conditional::Applied(20));

        let failed: Conditional<i32> = Conditional::PreconditionFailed(1);
        assert!(!failed.is_applied());
        assert_eq!(failed.into_inner(), 1);
    }

    #[test]
    fn encode_rejects_non_objects() {
        let err = encode("listings", &5).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}

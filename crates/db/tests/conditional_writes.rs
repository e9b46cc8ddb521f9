//! Tests for the default `patch_where` / `delete_where` implementations.
//!
//! `PlainStore` forwards the required calls to a `MemoryStore` but keeps the
//! trait's read-check-write defaults, the path a backend without single-key
//! atomic updates would take.

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::{json, Value};
use tradeit_core::listing::ListingStatus;
use tradeit_core::types::{new_entity_id, EntityId};
use tradeit_db::models::listing::CreateListing;
use tradeit_db::repositories::ListingRepo;
use tradeit_db::store::fields;
use tradeit_db::{Conditional, EntityStore, FieldMatch, MemoryStore, Record, StoreError};
use tradeit_events::{ChangePredicate, Subscription};

struct PlainStore {
    inner: MemoryStore,
}

#[async_trait]
impl EntityStore for PlainStore {
    async fn put(&self, collection: &str, key: EntityId, record: Record) -> Result<(), StoreError> {
        self.inner.put(collection, key, record).await
    }

    async fn patch(&self, collection: &str, key: EntityId, fields: Record) -> Result<Record, StoreError> {
        self.inner.patch(collection, key, fields).await
    }

    async fn get(&self, collection: &str, key: EntityId) -> Result<Option<Record>, StoreError> {
        self.inner.get(collection, key).await
    }

    async fn delete(&self, collection: &str, key: EntityId) -> Result<(), StoreError> {
        self.inner.delete(collection, key).await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>, StoreError> {
        self.inner.query_by_field(collection, field, value).await
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.inner.scan(collection).await
    }

    fn subscribe(&self, collection: &str, predicate: ChangePredicate) -> Subscription {
        self.inner.subscribe(collection, predicate)
    }
}

fn plain() -> Arc<PlainStore> {
    Arc::new(PlainStore {
        inner: MemoryStore::new(),
    })
}

fn chair() -> CreateListing {
    CreateListing {
        seller_id: "seller".into(),
        name: "Chair".into(),
        description: "Wooden".into(),
        category_id: new_entity_id(),
        price: 10.0,
    }
}

// ---------------------------------------------------------------------------
// Test: patch_where applies when the expectation holds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_patch_where_applies_on_match() {
    let store = plain();
    let key = new_entity_id();
    store
        .put("things", key, fields([("state", json!("open")), ("n", json!(1))]))
        .await
        .unwrap();

    let outcome = store
        .patch_where("things", key, &FieldMatch::new("state", "open"), fields([("n", json!(2))]))
        .await
        .unwrap();

    assert_matches!(outcome, Conditional::Applied(ref r) if r["n"] == json!(2));
    assert_eq!(store.get("things", key).await.unwrap().unwrap()["state"], json!("open"));
}

// ---------------------------------------------------------------------------
// Test: patch_where leaves the record alone when the expectation fails
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_patch_where_reports_current_record_on_mismatch() {
    let store = plain();
    let key = new_entity_id();
    store
        .put("things", key, fields([("state", json!("closed"))]))
        .await
        .unwrap();

    let outcome = store
        .patch_where("things", key, &FieldMatch::new("state", "open"), fields([("state", json!("x"))]))
        .await
        .unwrap();

    assert_matches!(outcome, Conditional::PreconditionFailed(ref r) if r["state"] == json!("closed"));
    assert_eq!(store.get("things", key).await.unwrap().unwrap()["state"], json!("closed"));
}

// ---------------------------------------------------------------------------
// Test: conditional writes on a missing key fail with NotFound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_conditional_writes_on_missing_key_fail() {
    let store = plain();
    let key = new_entity_id();
    let expect = FieldMatch::new("state", "open");

    assert_matches!(
        store.patch_where("things", key, &expect, Record::new()).await,
        Err(StoreError::NotFound { .. })
    );
    assert_matches!(
        store.delete_where("things", key, &expect).await,
        Err(StoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: the listing repository works unchanged over the default helpers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listing_repo_status_guards_over_default_helpers() {
    let store = plain();
    let listing = ListingRepo::create(store.as_ref(), &chair()).await.unwrap();

    let pending = fields([
        ("status", json!("pending")),
        ("buyer_id", json!("buyer")),
    ]);
    let claimed = ListingRepo::patch_if_status(store.as_ref(), listing.id, ListingStatus::Available, pending)
        .await
        .unwrap();
    assert_matches!(claimed, Conditional::Applied(ref l) if l.status == ListingStatus::Pending);

    let removed = ListingRepo::delete_if_status(store.as_ref(), listing.id, ListingStatus::Available)
        .await
        .unwrap();
    assert_matches!(removed, Conditional::PreconditionFailed(ref l) if l.buyer_id.as_deref() == Some("buyer"));
    assert!(ListingRepo::find_by_id(store.as_ref(), listing.id).await.unwrap().is_some());
}

//! Repository for the `listings` collection.
//!
//! Every write after creation is conditioned on the listing's current
//! status, so no caller can move lifecycle fields outside the state machine.
//! Patches carry only the fields they change. Query results are
//! point-in-time snapshots and may be stale by the time a caller acts.

use chrono::Utc;
use serde_json::Value;
use tradeit_core::listing::{ListingStatus, FIELD_BUYER_ID, FIELD_CATEGORY_ID, FIELD_SELLER_ID, FIELD_STATUS};
use tradeit_core::types::{new_entity_id, EntityId};

use crate::models::listing::{CreateListing, Listing};
use crate::store::{decode, encode, Conditional, EntityStore, FieldMatch, Record, StoreError};

/// Collection name for listings.
pub const LISTINGS: &str = "listings";

fn status_match(status: ListingStatus) -> FieldMatch {
    FieldMatch::new(FIELD_STATUS, status.as_str())
}

fn decode_all(records: Vec<Record>) -> Result<Vec<Listing>, StoreError> {
    records.into_iter().map(decode).collect()
}

/// Provides CRUD operations for listings.
pub struct ListingRepo;

impl ListingRepo {
    /// Insert a new `available` listing, returning it.
    pub async fn create(store: &dyn EntityStore, input: &CreateListing) -> Result<Listing, StoreError> {
        let listing = Listing::new(new_entity_id(), input, Utc::now());
        store
            .put(LISTINGS, listing.id, encode(LISTINGS, &listing)?)
            .await?;
        Ok(listing)
    }

    /// Find a listing by its ID.
    pub async fn find_by_id(store: &dyn EntityStore, id: EntityId) -> Result<Option<Listing>, StoreError> {
        store.get(LISTINGS, id).await?.map(decode).transpose()
    }

    /// Apply a partial patch only while the listing is still in `expected`.
    pub async fn patch_if_status(
        store: &dyn EntityStore,
        id: EntityId,
        expected: ListingStatus,
        fields: Record,
    ) -> Result<Conditional<Listing>, StoreError> {
        store
            .patch_where(LISTINGS, id, &status_match(expected), fields)
            .await?
            .try_map(decode)
    }

    /// Remove a listing only while it is still in `expected`.
    pub async fn delete_if_status(
        store: &dyn EntityStore,
        id: EntityId,
        expected: ListingStatus,
    ) -> Result<Conditional<Listing>, StoreError> {
        store
            .delete_where(LISTINGS, id, &status_match(expected))
            .await?
            .try_map(decode)
    }

    /// Snapshot of listings whose `field` equals `value`.
    pub async fn query_by_field(
        store: &dyn EntityStore,
        field: &str,
        value: Value,
    ) -> Result<Vec<Listing>, StoreError> {
        decode_all(store.query_by_field(LISTINGS, field, &value).await?)
    }

    /// All listings referencing a category.
    pub async fn list_by_category(store: &dyn EntityStore, category_id: EntityId) -> Result<Vec<Listing>, StoreError> {
        Self::query_by_field(store, FIELD_CATEGORY_ID, Value::from(category_id.to_string())).await
    }

    pub async fn list_by_status(store: &dyn EntityStore, status: ListingStatus) -> Result<Vec<Listing>, StoreError> {
        Self::query_by_field(store, FIELD_STATUS, Value::from(status.as_str())).await
    }

    pub async fn list_by_seller(store: &dyn EntityStore, seller_id: &str) -> Result<Vec<Listing>, StoreError> {
        Self::query_by_field(store, FIELD_SELLER_ID, Value::from(seller_id)).await
    }

    pub async fn list_by_buyer(store: &dyn EntityStore, buyer_id: &str) -> Result<Vec<Listing>, StoreError> {
        Self::query_by_field(store, FIELD_BUYER_ID, Value::from(buyer_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::fields;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn new_listing(seller: &str, category_id: EntityId) -> CreateListing {
        CreateListing {
            seller_id: seller.to_string(),
            name: "Chair".to_string(),
            description: "Wooden".to_string(),
            category_id,
            price: 15.0,
        }
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryStore::new();
        let category = new_entity_id();
        let created = ListingRepo::create(&store, &new_listing("s1", category)).await.unwrap();

        let found = ListingRepo::find_by_id(&store, created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.status, ListingStatus::Available);
        assert_eq!(found.category_id, Some(category));
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(ListingRepo::find_by_id(&store, new_entity_id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn patch_touches_only_given_fields() {
        let store = MemoryStore::new();
        let created = ListingRepo::create(&store, &new_listing("s1", new_entity_id())).await.unwrap();

        let outcome = ListingRepo::patch_if_status(
            &store,
            created.id,
            ListingStatus::Available,
            fields([("name", json!("Stool"))]),
        )
        .await
        .unwrap();
        assert_matches!(outcome, Conditional::Applied(_));
        let patched = outcome.into_inner();
        assert_eq!(patched.name, "Stool");
        assert_eq!(patched.description, created.description);
        assert_eq!(patched.status, created.status);
    }

    #[tokio::test]
    async fn conditional_patch_reports_current_state_on_mismatch() {
        let store = MemoryStore::new();
        let created = ListingRepo::create(&store, &new_listing("s1", new_entity_id())).await.unwrap();

        let outcome = ListingRepo::patch_if_status(
            &store,
            created.id,
            ListingStatus::Pending,
            fields([("name", json!("x"))]),
        )
        .await
        .unwrap();
        assert_matches!(outcome, Conditional::PreconditionFailed(l) if l.name == "Chair");
    }

    #[tokio::test]
    async fn queries_filter_by_field() {
        let store = MemoryStore::new();
        let books = new_entity_id();
        let tools = new_entity_id();
        ListingRepo::create(&store, &new_listing("s1", books)).await.unwrap();
        ListingRepo::create(&store, &new_listing("s2", books)).await.unwrap();
        ListingRepo::create(&store, &new_listing("s1", tools)).await.unwrap();

        assert_eq!(ListingRepo::list_by_category(&store, books).await.unwrap().len(), 2);
        assert_eq!(ListingRepo::list_by_seller(&store, "s1").await.unwrap().len(), 2);
        assert_eq!(
            ListingRepo::list_by_status(&store, ListingStatus::Available).await.unwrap().len(),
            3
        );
        assert!(ListingRepo::list_by_buyer(&store, "b1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_if_status_removes_matching() {
        let store = MemoryStore::new();
        let created = ListingRepo::create(&store, &new_listing("s1", new_entity_id())).await.unwrap();

        let outcome = ListingRepo::delete_if_status(&store, created.id, ListingStatus::Available)
            .await
            .unwrap();
        assert!(outcome.is_applied());
        assert!(ListingRepo::find_by_id(&store, created.id).await.unwrap().is_none());
    }
}

//! Repository for the `categories` collection.
//!
//! Plain typed CRUD. The active-listing guard sits one layer up, in the
//! market crate, because it has to consult listings.

use chrono::Utc;
use serde_json::Value;
use tradeit_core::category::{normalize_title, FIELD_CREATOR_ID, FIELD_TITLE};
use tradeit_core::types::{new_entity_id, EntityId};

use crate::models::category::{Category, CreateCategory};
use crate::store::{decode, encode, fields, EntityStore, Record, StoreError};

/// Collection name for categories.
pub const CATEGORIES: &str = "categories";

fn sorted_by_title(records: Vec<Record>) -> Result<Vec<Category>, StoreError> {
    let mut categories = records
        .into_iter()
        .map(decode)
        .collect::<Result<Vec<Category>, _>>()?;
    categories.sort_by_key(|c| normalize_title(&c.title));
    Ok(categories)
}

/// Provides CRUD operations for categories.
pub struct CategoryRepo;

impl CategoryRepo {
    /// Insert a new category with a trimmed title, returning it.
    pub async fn create(store: &dyn EntityStore, input: &CreateCategory) -> Result<Category, StoreError> {
        let category = Category {
            id: new_entity_id(),
            creator_id: input.creator_id.clone(),
            title: input.title.trim().to_string(),
            created_at: Utc::now(),
        };
        store
            .put(CATEGORIES, category.id, encode(CATEGORIES, &category)?)
            .await?;
        Ok(category)
    }

    /// Find a category by its ID.
    pub async fn find_by_id(store: &dyn EntityStore, id: EntityId) -> Result<Option<Category>, StoreError> {
        store.get(CATEGORIES, id).await?.map(decode).transpose()
    }

    /// List all categories, ordered by title (case-insensitive).
    pub async fn list_all(store: &dyn EntityStore) -> Result<Vec<Category>, StoreError> {
        sorted_by_title(store.scan(CATEGORIES).await?)
    }

    /// List the categories a user created, ordered by title.
    pub async fn list_by_creator(store: &dyn EntityStore, creator_id: &str) -> Result<Vec<Category>, StoreError> {
        sorted_by_title(
            store
                .query_by_field(CATEGORIES, FIELD_CREATOR_ID, &Value::from(creator_id))
                .await?,
        )
    }

    /// Apply a partial patch and return the category as written.
    pub async fn patch(store: &dyn EntityStore, id: EntityId, fields: Record) -> Result<Category, StoreError> {
        decode(store.patch(CATEGORIES, id, fields).await?)
    }

    /// Replace the title only.
    pub async fn rename(store: &dyn EntityStore, id: EntityId, title: &str) -> Result<Category, StoreError> {
        Self::patch(store, id, fields([(FIELD_TITLE, Value::from(title.trim()))])).await
    }

    /// Remove a category.
    pub async fn delete(store: &dyn EntityStore, id: EntityId) -> Result<(), StoreError> {
        store.delete(CATEGORIES, id).await
    }
}

//! Guarded category operations.
//!
//! Creation enforces title rules. Rename and delete are additionally gated
//! on the creator and on the [`CategoryUsageGuard`], which is re-run right
//! before the write because the store cannot wrap check and write in one
//! transaction.

use std::sync::Arc;

use tradeit_core::category::{check_unique_title, validate_title};
use tradeit_core::error::CoreError;
use tradeit_core::types::EntityId;
use tradeit_db::models::category::{Category, CreateCategory};
use tradeit_db::repositories::CategoryRepo;
use tradeit_db::DbStore;

use crate::cache::CategoryTitleCache;
use crate::error::MarketResult;
use crate::guard::CategoryUsageGuard;

pub struct CategoryService {
    store: DbStore,
    guard: CategoryUsageGuard,
    cache: Arc<CategoryTitleCache>,
}

impl CategoryService {
    pub fn new(store: DbStore, cache: Arc<CategoryTitleCache>) -> Self {
        Self {
            guard: CategoryUsageGuard::new(Arc::clone(&store)),
            store,
            cache,
        }
    }

    pub fn guard(&self) -> &CategoryUsageGuard {
        &self.guard
    }

    /// Load a category, failing with `NotFound` if it is gone.
    pub async fn get(&self, category_id: EntityId) -> MarketResult<Category> {
        let category = CategoryRepo::find_by_id(self.store.as_ref(), category_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "category",
                id: category_id,
            })?;
        self.cache.insert(category.id, category.title.clone()).await;
        Ok(category)
    }

    async fn check_unique(&self, title: &str, exclude: Option<EntityId>) -> MarketResult<()> {
        let existing = CategoryRepo::list_all(self.store.as_ref()).await?;
        check_unique_title(
            title,
            existing.iter().map(|c| (c.id, c.title.as_str())),
            exclude,
        )?;
        Ok(())
    }

    fn check_creator(category: &Category, actor: &str) -> MarketResult<()> {
        if category.creator_id != actor {
            return Err(CoreError::NotOwner(
                "Only the creator can change this category".to_string(),
            )
            .into());
        }
        Ok(())
    }

    pub async fn create_category(&self, creator_id: &str, title: &str) -> MarketResult<Category> {
        validate_title(title)?;
        self.check_unique(title, None).await?;

        let category = CategoryRepo::create(
            self.store.as_ref(),
            &CreateCategory {
                creator_id: creator_id.to_string(),
                title: title.to_string(),
            },
        )
        .await?;
        self.cache.insert(category.id, category.title.clone()).await;

        tracing::info!(
            category_id = %category.id,
            creator_id = %creator_id,
            title = %category.title,
            "Category created"
        );
        Ok(category)
    }

    pub async fn rename_category(
        &self,
        actor: &str,
        category_id: EntityId,
        new_title: &str,
    ) -> MarketResult<Category> {
        let category = self.get(category_id).await?;
        Self::check_creator(&category, actor)?;
        self.guard.assert_no_active_listings(category_id).await?;

        validate_title(new_title)?;
        self.check_unique(new_title, Some(category_id)).await?;

        // Last read before the write.
        self.guard.assert_no_active_listings(category_id).await?;
        let renamed = CategoryRepo::rename(self.store.as_ref(), category_id, new_title).await?;
        self.cache.insert(renamed.id, renamed.title.clone()).await;

        tracing::info!(
            category_id = %category_id,
            old_title = %category.title,
            new_title = %renamed.title,
            "Category renamed"
        );
        Ok(renamed)
    }

    pub async fn delete_category(&self, actor: &str, category_id: EntityId) -> MarketResult<()> {
        let category = self.get(category_id).await?;
        Self::check_creator(&category, actor)?;

        // Callers usually ran the guard before asking for confirmation; this
        // is the last read before the write.
        self.guard.assert_no_active_listings(category_id).await?;
        CategoryRepo::delete(self.store.as_ref(), category_id).await?;
        self.cache.remove(category_id).await;

        tracing::info!(category_id = %category_id, title = %category.title, "Category deleted");
        Ok(())
    }

    /// All categories ordered by title.
    pub async fn list_categories(&self) -> MarketResult<Vec<Category>> {
        let categories = CategoryRepo::list_all(self.store.as_ref()).await?;
        for category in &categories {
            self.cache.insert(category.id, category.title.clone()).await;
        }
        Ok(categories)
    }

    pub async fn categories_by_creator(&self, creator_id: &str) -> MarketResult<Vec<Category>> {
        let categories = CategoryRepo::list_by_creator(self.store.as_ref(), creator_id).await?;
        for category in &categories {
            self.cache.insert(category.id, category.title.clone()).await;
        }
        Ok(categories)
    }
}

//! Category usage guard.
//!
//! A category may be renamed or deleted only while no active listing
//! (`available` or `pending`) references it. Completed listings carry their
//! own title snapshot and do not count.
//!
//! The check is a snapshot query followed by a separate write, so it is
//! advisory: callers run it once as an early gate and again immediately
//! before the write to keep the window small.

use tradeit_core::category::guard_decision;
use tradeit_core::types::EntityId;
use tradeit_db::models::listing::Listing;
use tradeit_db::repositories::ListingRepo;
use tradeit_db::DbStore;

use crate::error::MarketResult;

#[derive(Clone)]
pub struct CategoryUsageGuard {
    store: DbStore,
}

impl CategoryUsageGuard {
    pub fn new(store: DbStore) -> Self {
        Self { store }
    }

    /// Listings referencing `category_id` whose status is not `completed`.
    pub async fn active_listings(&self, category_id: EntityId) -> MarketResult<Vec<Listing>> {
        let listings = ListingRepo::list_by_category(self.store.as_ref(), category_id).await?;
        Ok(listings.into_iter().filter(Listing::is_active).collect())
    }

    /// Allow when no active listing references the category, otherwise deny
    /// with `DeniedByGuard` carrying the blocking count.
    pub async fn assert_no_active_listings(&self, category_id: EntityId) -> MarketResult<()> {
        let active_count = self.active_listings(category_id).await?.len();
        if active_count > 0 {
            tracing::warn!(
                category_id = %category_id,
                active_count,
                "Category mutation denied, active listings depend on it"
            );
        }
        Ok(guard_decision(category_id, active_count)?)
    }
}

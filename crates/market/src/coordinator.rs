//! Listing lifecycle coordinator.
//!
//! The only component that moves a listing between `available`, `pending`
//! and `completed`. There is no lock shared between parties, so:
//!
//! - `request_listing` is the one exclusive transition. It re-reads the
//!   listing right before a write conditioned on `status == available`; a
//!   lost race surfaces as `InvalidState` ("Item no longer available").
//! - `confirm` is convergent. Both parties may run the
//!   confirm / re-read / complete sequence concurrently and every executor
//!   lands on the same terminal record.
//!
//! Every write is the smallest field set that keeps the record invariants.

use std::sync::Arc;

use serde_json::Value;
use tradeit_core::error::CoreError;
use tradeit_core::listing::{
    check_available, check_confirm, check_request, check_seller, completion_due,
    validate_description, validate_name, validate_price, ConfirmationState, ListingStatus,
    PartyRole, FIELD_BUYER_CONFIRMED, FIELD_BUYER_ID, FIELD_CATEGORY_TITLE,
    FIELD_SELLER_CONFIRMED, FIELD_STATUS,
};
use tradeit_core::types::EntityId;
use tradeit_db::models::listing::{Listing, UpdateListing};
use tradeit_db::repositories::{CategoryRepo, ListingRepo};
use tradeit_db::store::fields;
use tradeit_db::{Conditional, DbStore};

use crate::cache::CategoryTitleCache;
use crate::error::MarketResult;

const NO_LONGER_AVAILABLE: &str = "Item no longer available";

pub struct LifecycleCoordinator {
    store: DbStore,
    cache: Arc<CategoryTitleCache>,
    request_max_attempts: u32,
}

impl LifecycleCoordinator {
    pub fn new(store: DbStore, cache: Arc<CategoryTitleCache>, request_max_attempts: u32) -> Self {
        Self {
            store,
            cache,
            request_max_attempts: request_max_attempts.max(1),
        }
    }

    /// Authoritative read of a listing.
    pub async fn load(&self, listing_id: EntityId) -> MarketResult<Listing> {
        Ok(ListingRepo::find_by_id(self.store.as_ref(), listing_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "listing",
                id: listing_id,
            })?)
    }

    /// Claim an available listing for `buyer_id`.
    ///
    /// Writes `buyer_id`, `status = pending` and both confirmation flags as
    /// one patch. A request that loses the race to another buyer fails with
    /// `InvalidState`; it never overwrites the winner.
    pub async fn request_listing(&self, listing_id: EntityId, buyer_id: &str) -> MarketResult<Listing> {
        for attempt in 1..=self.request_max_attempts {
            let current = self.load(listing_id).await?;
            check_request(current.status, &current.seller_id, buyer_id)?;

            let patch = fields([
                (FIELD_BUYER_ID, Value::from(buyer_id)),
                (FIELD_STATUS, Value::from(ListingStatus::Pending.as_str())),
                (FIELD_BUYER_CONFIRMED, Value::Bool(false)),
                (FIELD_SELLER_CONFIRMED, Value::Bool(false)),
            ]);

            match ListingRepo::patch_if_status(
                self.store.as_ref(),
                listing_id,
                ListingStatus::Available,
                patch,
            )
            .await?
            {
                Conditional::Applied(_) => {
                    // Read back our own write: a store without atomic
                    // conditional patches may have let another buyer in.
                    let claimed = self.load(listing_id).await?;
                    if claimed.buyer_id.as_deref() != Some(buyer_id) {
                        tracing::warn!(
                            listing_id = %listing_id,
                            buyer_id = %buyer_id,
                            "Request overwritten by a concurrent buyer"
                        );
                        return Err(CoreError::InvalidState(NO_LONGER_AVAILABLE.to_string()).into());
                    }
                    tracing::info!(
                        listing_id = %listing_id,
                        buyer_id = %buyer_id,
                        attempt,
                        "Listing requested"
                    );
                    return Ok(claimed);
                }
                Conditional::PreconditionFailed(seen) => {
                    tracing::warn!(
                        listing_id = %listing_id,
                        buyer_id = %buyer_id,
                        attempt,
                        status = %seen.status,
                        "Listing changed before request could be written"
                    );
                }
            }
        }

        Err(CoreError::InvalidState(NO_LONGER_AVAILABLE.to_string()).into())
    }

    /// Set the acting party's confirmation flag, then complete the listing
    /// if both flags are set.
    ///
    /// Confirming twice is a no-op. Completion is conditioned on the listing
    /// still being pending, so concurrent executors converge on one record.
    pub async fn confirm(
        &self,
        listing_id: EntityId,
        actor: &str,
        role: PartyRole,
    ) -> MarketResult<ConfirmationState> {
        let current = self.load(listing_id).await?;
        check_confirm(
            current.status,
            role,
            actor,
            &current.seller_id,
            current.buyer_id.as_deref(),
        )?;

        let already_confirmed = match role {
            PartyRole::Buyer => current.buyer_confirmed,
            PartyRole::Seller => current.seller_confirmed,
        };

        if already_confirmed {
            tracing::debug!(listing_id = %listing_id, %role, "Already confirmed, nothing to write");
        } else {
            let patch = fields([(role.confirmation_field(), Value::Bool(true))]);
            match ListingRepo::patch_if_status(
                self.store.as_ref(),
                listing_id,
                ListingStatus::Pending,
                patch,
            )
            .await?
            {
                Conditional::Applied(_) => {
                    tracing::info!(listing_id = %listing_id, %role, "Party confirmed");
                }
                Conditional::PreconditionFailed(seen) => {
                    return Err(CoreError::InvalidState(format!(
                        "Only pending listings can be confirmed (status is {})",
                        seen.status
                    ))
                    .into());
                }
            }
        }

        let latest = self.load(listing_id).await?;
        if !completion_due(latest.status, latest.buyer_confirmed, latest.seller_confirmed) {
            return Ok(latest.confirmation_state());
        }

        self.complete(latest).await
    }

    /// Write `status = completed` with the category title snapshot.
    async fn complete(&self, listing: Listing) -> MarketResult<ConfirmationState> {
        let mut patch = fields([(FIELD_STATUS, Value::from(ListingStatus::Completed.as_str()))]);
        if let Some(title) = self.snapshot_title(listing.category_id).await? {
            patch.insert(FIELD_CATEGORY_TITLE.to_string(), Value::from(title));
        }

        let outcome = ListingRepo::patch_if_status(
            self.store.as_ref(),
            listing.id,
            ListingStatus::Pending,
            patch,
        )
        .await?;

        match outcome {
            Conditional::Applied(done) => {
                tracing::info!(
                    listing_id = %done.id,
                    category_title = ?done.category_title,
                    "Listing completed"
                );
                Ok(done.confirmation_state())
            }
            Conditional::PreconditionFailed(done) => {
                tracing::debug!(listing_id = %done.id, status = %done.status, "Completed concurrently");
                Ok(done.confirmation_state())
            }
        }
    }

    /// Title to freeze on completion: the client's cached copy, else a
    /// fresh lookup. A category that vanished leaves no snapshot.
    async fn snapshot_title(&self, category_id: Option<EntityId>) -> MarketResult<Option<String>> {
        let Some(category_id) = category_id else {
            return Ok(None);
        };
        if let Some(title) = self.cache.get(category_id).await {
            return Ok(Some(title));
        }
        match CategoryRepo::find_by_id(self.store.as_ref(), category_id).await? {
            Some(category) => {
                self.cache.insert(category.id, category.title.clone()).await;
                Ok(Some(category.title))
            }
            None => {
                tracing::warn!(category_id = %category_id, "Category missing at completion, no title snapshot");
                Ok(None)
            }
        }
    }

    /// Delete an available listing on behalf of its seller.
    pub async fn cancel_available(&self, listing_id: EntityId, seller_id: &str) -> MarketResult<()> {
        let current = self.load(listing_id).await?;
        check_seller(&current.seller_id, seller_id)?;
        check_available(current.status, "deleted")?;

        match ListingRepo::delete_if_status(self.store.as_ref(), listing_id, ListingStatus::Available)
            .await?
        {
            Conditional::Applied(_) => {
                tracing::info!(listing_id = %listing_id, seller_id = %seller_id, "Listing deleted");
                Ok(())
            }
            Conditional::PreconditionFailed(seen) => {
                tracing::warn!(listing_id = %listing_id, status = %seen.status, "Listing left available before delete");
                Err(CoreError::InvalidState(format!(
                    "Only available listings can be deleted (status is {})",
                    seen.status
                ))
                .into())
            }
        }
    }

    /// Patch content fields of an available listing. Lifecycle fields are
    /// never part of the patch.
    pub async fn edit_available(
        &self,
        listing_id: EntityId,
        seller_id: &str,
        update: &UpdateListing,
    ) -> MarketResult<Listing> {
        let current = self.load(listing_id).await?;
        check_seller(&current.seller_id, seller_id)?;
        check_available(current.status, "edited")?;

        if update.is_empty() {
            return Ok(current);
        }
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(description) = &update.description {
            validate_description(description)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }
        if let Some(category_id) = update.category_id {
            let category = CategoryRepo::find_by_id(self.store.as_ref(), category_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "category",
                    id: category_id,
                })?;
            self.cache.insert(category.id, category.title).await;
        }

        match ListingRepo::patch_if_status(
            self.store.as_ref(),
            listing_id,
            ListingStatus::Available,
            update.to_fields(),
        )
        .await?
        {
            Conditional::Applied(listing) => {
                tracing::info!(listing_id = %listing_id, "Listing edited");
                Ok(listing)
            }
            Conditional::PreconditionFailed(seen) => {
                tracing::warn!(listing_id = %listing_id, status = %seen.status, "Listing left available before edit");
                Err(CoreError::InvalidState(format!(
                    "Only available listings can be edited (status is {})",
                    seen.status
                ))
                .into())
            }
        }
    }
}

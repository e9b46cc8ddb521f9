//! Caller-facing marketplace client.
//!
//! One [`Marketplace`] per party client. Clients share the store but not
//! their category title caches, mirroring independent devices talking to a
//! common backend. Each cache follows the categories change feed, so a
//! rename by one client is what every other client shows and snapshots.

use std::sync::Arc;

use serde_json::Value;
use tradeit_core::error::CoreError;
use tradeit_core::listing::{
    validate_description, validate_name, validate_price, ConfirmationState, ListingStatus,
    PartyRole,
};
use tradeit_core::types::EntityId;
use tradeit_db::models::category::Category;
use tradeit_db::models::listing::{CreateListing, Listing, UpdateListing};
use tradeit_db::repositories::{ListingRepo, CATEGORIES, LISTINGS};
use tradeit_db::DbStore;
use tradeit_events::{ChangeEvent, Subscription};

use crate::cache::CategoryTitleCache;
use crate::categories::CategoryService;
use crate::config::MarketConfig;
use crate::coordinator::LifecycleCoordinator;
use crate::error::MarketResult;

pub struct Marketplace {
    store: DbStore,
    cache: Arc<CategoryTitleCache>,
    coordinator: LifecycleCoordinator,
    categories: CategoryService,
}

impl Marketplace {
    pub fn new(store: DbStore, config: &MarketConfig) -> Self {
        let cache = Arc::new(CategoryTitleCache::synced(
            store.subscribe(CATEGORIES, Arc::new(|_: &ChangeEvent| true)),
        ));
        Self {
            coordinator: LifecycleCoordinator::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                config.request_max_attempts,
            ),
            categories: CategoryService::new(Arc::clone(&store), Arc::clone(&cache)),
            store,
            cache,
        }
    }

    // ---- Listings ----

    /// Publish a new `available` listing.
    pub async fn create_listing(&self, input: &CreateListing) -> MarketResult<Listing> {
        validate_name(&input.name)?;
        validate_description(&input.description)?;
        validate_price(input.price)?;
        self.categories.get(input.category_id).await?;

        let listing = ListingRepo::create(self.store.as_ref(), input).await?;
        tracing::info!(
            listing_id = %listing.id,
            seller_id = %listing.seller_id,
            category_id = %input.category_id,
            price = listing.price,
            "Listing created"
        );
        Ok(listing)
    }

    pub async fn get_listing(&self, listing_id: EntityId) -> MarketResult<Listing> {
        self.coordinator.load(listing_id).await
    }

    pub async fn edit_available(
        &self,
        listing_id: EntityId,
        seller_id: &str,
        update: &UpdateListing,
    ) -> MarketResult<Listing> {
        self.coordinator.edit_available(listing_id, seller_id, update).await
    }

    pub async fn cancel_available(&self, listing_id: EntityId, seller_id: &str) -> MarketResult<()> {
        self.coordinator.cancel_available(listing_id, seller_id).await
    }

    pub async fn request_listing(&self, listing_id: EntityId, buyer_id: &str) -> MarketResult<Listing> {
        self.coordinator.request_listing(listing_id, buyer_id).await
    }

    pub async fn confirm(
        &self,
        listing_id: EntityId,
        actor: &str,
        role: PartyRole,
    ) -> MarketResult<ConfirmationState> {
        self.coordinator.confirm(listing_id, actor, role).await
    }

    // ---- Listing queries ----

    /// Home feed: every listing still open for requests, newest first.
    pub async fn available_listings(&self) -> MarketResult<Vec<Listing>> {
        let listings = ListingRepo::list_by_status(self.store.as_ref(), ListingStatus::Available).await?;
        Ok(newest_first(listings))
    }

    /// A seller's items that have not completed yet.
    pub async fn seller_listings(&self, seller_id: &str) -> MarketResult<Vec<Listing>> {
        let listings = ListingRepo::list_by_seller(self.store.as_ref(), seller_id).await?;
        Ok(newest_first(listings.into_iter().filter(Listing::is_active).collect()))
    }

    /// Pending items where `seller_id` is the seller.
    pub async fn incoming_requests(&self, seller_id: &str) -> MarketResult<Vec<Listing>> {
        let listings = ListingRepo::list_by_seller(self.store.as_ref(), seller_id).await?;
        Ok(newest_first(with_status(listings, ListingStatus::Pending)))
    }

    /// Pending items where `buyer_id` is the buyer.
    pub async fn outgoing_requests(&self, buyer_id: &str) -> MarketResult<Vec<Listing>> {
        let listings = ListingRepo::list_by_buyer(self.store.as_ref(), buyer_id).await?;
        Ok(newest_first(with_status(listings, ListingStatus::Pending)))
    }

    /// Completed trades where `user_id` was either party.
    pub async fn completed_transactions(&self, user_id: &str) -> MarketResult<Vec<Listing>> {
        let completed = ListingRepo::list_by_status(self.store.as_ref(), ListingStatus::Completed).await?;
        Ok(newest_first(
            completed.into_iter().filter(|l| l.involves(user_id)).collect(),
        ))
    }

    pub async fn listings_in_category(&self, category_id: EntityId) -> MarketResult<Vec<Listing>> {
        let listings = ListingRepo::list_by_category(self.store.as_ref(), category_id).await?;
        Ok(newest_first(listings))
    }

    // ---- Categories ----

    pub async fn create_category(&self, creator_id: &str, title: &str) -> MarketResult<Category> {
        self.categories.create_category(creator_id, title).await
    }

    pub async fn rename_category(
        &self,
        actor: &str,
        category_id: EntityId,
        new_title: &str,
    ) -> MarketResult<Category> {
        self.categories.rename_category(actor, category_id, new_title).await
    }

    pub async fn delete_category(&self, actor: &str, category_id: EntityId) -> MarketResult<()> {
        self.categories.delete_category(actor, category_id).await
    }

    /// Early gate for a category edit; the mutation itself checks again.
    pub async fn check_category_usage(&self, category_id: EntityId) -> MarketResult<()> {
        self.categories.guard().assert_no_active_listings(category_id).await
    }

    pub async fn list_categories(&self) -> MarketResult<Vec<Category>> {
        self.categories.list_categories().await
    }

    pub async fn categories_by_creator(&self, creator_id: &str) -> MarketResult<Vec<Category>> {
        self.categories.categories_by_creator(creator_id).await
    }

    /// Title to display for a listing's category.
    ///
    /// Completed listings show their snapshot, so the answer survives the
    /// category being renamed or deleted afterwards.
    pub async fn category_title(&self, listing: &Listing) -> MarketResult<Option<String>> {
        if let Some(snapshot) = &listing.category_title {
            return Ok(Some(snapshot.clone()));
        }
        let Some(category_id) = listing.category_id else {
            return Ok(None);
        };
        if let Some(title) = self.cache.get(category_id).await {
            return Ok(Some(title));
        }
        match self.categories.get(category_id).await {
            Ok(category) => Ok(Some(category.title)),
            Err(err) if matches!(err.as_core(), Some(CoreError::NotFound { .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    // ---- Change feed ----

    /// Changes to a single listing, including its deletion.
    pub fn watch_listing(&self, listing_id: EntityId) -> Subscription {
        self.store.subscribe(
            LISTINGS,
            Arc::new(move |event: &ChangeEvent| event.key == listing_id),
        )
    }

    /// Listing changes whose record has `field == value`. Deletions carry no
    /// record and never match.
    pub fn watch_listings_where(&self, field: &str, value: Value) -> Subscription {
        let field = field.to_string();
        self.store.subscribe(
            LISTINGS,
            Arc::new(move |event: &ChangeEvent| {
                event.field(&field).is_some_and(|v| *v == value)
            }),
        )
    }

    /// Every change to `collection`.
    pub fn watch_collection(&self, collection: &str) -> Subscription {
        self.store
            .subscribe(collection, Arc::new(|_: &ChangeEvent| true))
    }

    pub fn watch_categories(&self) -> Subscription {
        self.watch_collection(CATEGORIES)
    }
}

fn with_status(listings: Vec<Listing>, status: ListingStatus) -> Vec<Listing> {
    listings.into_iter().filter(|l| l.status == status).collect()
}

fn newest_first(mut listings: Vec<Listing>) -> Vec<Listing> {
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    listings
}

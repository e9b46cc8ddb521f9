#![allow(dead_code)]

use std::sync::Arc;

use tradeit_core::types::EntityId;
use tradeit_db::models::category::Category;
use tradeit_db::models::listing::{CreateListing, Listing};
use tradeit_db::{DbStore, MemoryStore};
use tradeit_market::{MarketConfig, Marketplace};

pub const SELLER: &str = "seller-s";
pub const BUYER: &str = "buyer-b";
pub const OTHER_BUYER: &str = "buyer-b2";

/// A shared store plus one client per party.
pub struct Market {
    pub store: Arc<MemoryStore>,
    pub seller: Arc<Marketplace>,
    pub buyer: Arc<Marketplace>,
    pub other_buyer: Arc<Marketplace>,
}

impl Market {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = MarketConfig::default();
        let shared: DbStore = store.clone();
        Self {
            seller: Arc::new(Marketplace::new(Arc::clone(&shared), &config)),
            buyer: Arc::new(Marketplace::new(Arc::clone(&shared), &config)),
            other_buyer: Arc::new(Marketplace::new(shared, &config)),
            store,
        }
    }

    /// Another independent client on the same store.
    pub fn client(&self) -> Arc<Marketplace> {
        let shared: DbStore = self.store.clone();
        Arc::new(Marketplace::new(shared, &MarketConfig::default()))
    }

    pub async fn category(&self, title: &str) -> Category {
        self.seller.create_category(SELLER, title).await.unwrap()
    }

    pub async fn listing(&self, category_id: EntityId) -> Listing {
        self.seller.create_listing(&chair(category_id)).await.unwrap()
    }

    /// A listing already requested by `BUYER`.
    pub async fn pending_listing(&self, category_id: EntityId) -> Listing {
        let listing = self.listing(category_id).await;
        self.buyer.request_listing(listing.id, BUYER).await.unwrap()
    }
}

pub fn chair(category_id: EntityId) -> CreateListing {
    CreateListing {
        seller_id: SELLER.to_string(),
        name: "Oak chair".to_string(),
        description: "Solid oak".to_string(),
        category_id,
        price: 25.0,
    }
}

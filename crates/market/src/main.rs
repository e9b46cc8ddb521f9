//! `market-sim`: plays the marketplace lifecycle scenarios against the
//! in-memory store with independent seller and buyer clients.

use std::sync::Arc;

use anyhow::Context;
use tradeit_core::listing::PartyRole;
use tradeit_core::types::EntityId;
use tradeit_db::models::listing::CreateListing;
use tradeit_db::{create_memory_store, DbStore};
use tradeit_market::logging::init_tracing;
use tradeit_market::{MarketConfig, Marketplace};

const SELLER: &str = "sam-seller";
const BUYER: &str = "bea-buyer";
const OTHER_BUYER: &str = "bo-buyer";

fn chair(category_id: EntityId) -> CreateListing {
    CreateListing {
        seller_id: SELLER.to_string(),
        name: "Oak chair".to_string(),
        description: "Sturdy, a little scratched".to_string(),
        category_id,
        price: 25.0,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MarketConfig::from_env().context("loading configuration")?;
    init_tracing(config.log_format).context("installing tracing subscriber")?;

    let store: DbStore = create_memory_store(config.change_feed_capacity);
    let seller = Marketplace::new(Arc::clone(&store), &config);
    let buyer = Arc::new(Marketplace::new(Arc::clone(&store), &config));
    let other_buyer = Arc::new(Marketplace::new(Arc::clone(&store), &config));

    let furniture = seller.create_category(SELLER, "Furniture").await?;

    // ---- Scenario A: request ----
    let l1 = seller.create_listing(&chair(furniture.id)).await?;
    let requested = buyer.request_listing(l1.id, BUYER).await?;
    tracing::info!(scenario = "A", status = %requested.status, buyer = ?requested.buyer_id, "Requested");

    // ---- Scenario C (first half): guard denies while pending ----
    match seller.delete_category(SELLER, furniture.id).await {
        Err(err) => tracing::info!(scenario = "C", code = err.code(), message = %err.user_message(), "Delete denied"),
        Ok(()) => anyhow::bail!("category with a pending listing was deleted"),
    }

    // ---- Scenario B: both parties confirm ----
    let state = seller.confirm(l1.id, SELLER, PartyRole::Seller).await?;
    tracing::info!(scenario = "B", ?state, "Seller confirmed");
    let state = buyer.confirm(l1.id, BUYER, PartyRole::Buyer).await?;
    let done = buyer.get_listing(l1.id).await?;
    tracing::info!(scenario = "B", ?state, title = ?done.category_title, "Buyer confirmed");

    // ---- Scenario C (second half): allowed once completed ----
    seller.delete_category(SELLER, furniture.id).await?;
    let title = buyer.category_title(&done).await?;
    tracing::info!(scenario = "C", ?title, "Category deleted, snapshot kept");

    // ---- Scenario D: two buyers race ----
    let toys = seller.create_category(SELLER, "Toys").await?;
    let l2 = seller.create_listing(&chair(toys.id)).await?;
    let (first, second) = tokio::join!(
        {
            let buyer = Arc::clone(&buyer);
            async move { buyer.request_listing(l2.id, BUYER).await }
        },
        {
            let other_buyer = Arc::clone(&other_buyer);
            async move { other_buyer.request_listing(l2.id, OTHER_BUYER).await }
        }
    );
    let winners = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    tracing::info!(scenario = "D", winners, "Concurrent requests settled");

    // ---- Scenario E: cancel ----
    let l3 = seller.create_listing(&chair(toys.id)).await?;
    seller.cancel_available(l3.id, SELLER).await?;
    tracing::info!(scenario = "E", listing_id = %l3.id, "Cancelled while available");
    match seller.cancel_available(l2.id, SELLER).await {
        Err(err) => tracing::info!(scenario = "E", code = err.code(), "Cancel refused while pending"),
        Ok(()) => anyhow::bail!("pending listing was cancelled"),
    }

    tracing::info!("All scenarios finished");
    Ok(())
}

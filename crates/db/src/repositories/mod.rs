pub mod category_repo;
pub mod listing_repo;

pub use category_repo::{CategoryRepo, CATEGORIES};
pub use listing_repo::{ListingRepo, LISTINGS};

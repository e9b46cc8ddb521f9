pub mod category;
pub mod listing;

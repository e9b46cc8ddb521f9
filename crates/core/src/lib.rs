//! Domain rules for the trade marketplace: listing lifecycle, party roles,
//! and category constraints. No I/O lives here.

pub mod category;
pub mod error;
pub mod listing;
pub mod types;

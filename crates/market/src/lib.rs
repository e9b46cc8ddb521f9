//! Marketplace lifecycle services.
//!
//! [`Marketplace`] is the per-client entry point. It drives listings through
//! `available -> pending -> completed` via the [`LifecycleCoordinator`] and
//! gates category edits with the [`CategoryUsageGuard`].

pub mod cache;
pub mod categories;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod guard;
pub mod logging;
pub mod marketplace;

pub use config::{LogFormat, MarketConfig};
pub use coordinator::LifecycleCoordinator;
pub use error::{ErrorKind, MarketError, MarketResult};
pub use guard::CategoryUsageGuard;
pub use marketplace::Marketplace;

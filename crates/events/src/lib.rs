//! Change notification infrastructure for the entity store.
//!
//! - [`ChangeFeed`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`ChangeEvent`]: the envelope published after every store write.
//! - [`Subscription`]: a per-collection, predicate-filtered receiver that
//!   can also be consumed as a `Stream`.

pub mod bus;

pub use bus::{ChangeEvent, ChangeFeed, ChangeKind, ChangePredicate, Lagged, Subscription};

//! Category model.

use serde::{Deserialize, Serialize};
use tradeit_core::types::{EntityId, Timestamp, UserId};

/// A record from the `categories` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub creator_id: UserId,
    pub title: String,
    pub created_at: Timestamp,
}

/// DTO for creating a new category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub creator_id: UserId,
    pub title: String,
}

//! Domain error taxonomy.
//!
//! Each variant maps to one caller-visible failure kind. Lower layers fold
//! their own failures into these before they reach a caller.

use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation's lifecycle precondition does not hold.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The caller is not the party authorized for the action.
    #[error("Not owner: {0}")]
    NotOwner(String),

    /// Category mutation blocked by listings that still depend on it.
    #[error("Category {category_id} is in use by {active_count} active listing(s)")]
    DeniedByGuard {
        category_id: EntityId,
        active_count: usize,
    },

    /// The underlying store call failed; nothing was applied.
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

//! Marketplace error type and its caller-facing codes and messages.

use tradeit_core::error::CoreError;
use tradeit_db::StoreError;

/// Error type for every marketplace operation.
///
/// Wraps [`CoreError`] for domain errors. Store failures are folded into
/// `CoreError::OperationFailed` (or `NotFound` when a key vanished), so
/// callers only ever see the domain taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// A domain-level error from `tradeit_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for marketplace results.
pub type MarketResult<T> = Result<T, MarketError>;

/// One category per user-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    InvalidState,
    NotOwner,
    DeniedByGuard,
    OperationFailed,
    Config,
}

fn entity_name(collection: &str) -> &'static str {
    match collection {
        tradeit_db::repositories::LISTINGS => "listing",
        tradeit_db::repositories::CATEGORIES => "category",
        _ => "record",
    }
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, key } => MarketError::Core(CoreError::NotFound {
                entity: entity_name(&collection),
                id: key,
            }),
            other => {
                tracing::error!(error = %other, "Store call failed");
                MarketError::Core(CoreError::OperationFailed(other.to_string()))
            }
        }
    }
}

impl MarketError {
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            MarketError::Core(core) => Some(core),
            MarketError::Config(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Core(core) => match core {
                CoreError::NotFound { .. } => ErrorKind::NotFound,
                CoreError::Validation(_) => ErrorKind::Validation,
                CoreError::InvalidState(_) => ErrorKind::InvalidState,
                CoreError::NotOwner(_) => ErrorKind::NotOwner,
                CoreError::DeniedByGuard { .. } => ErrorKind::DeniedByGuard,
                CoreError::OperationFailed(_) => ErrorKind::OperationFailed,
            },
            MarketError::Config(_) => ErrorKind::Config,
        }
    }

    /// Stable machine-readable code, one per [`ErrorKind`].
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::NotOwner => "NOT_OWNER",
            ErrorKind::DeniedByGuard => "DENIED_BY_GUARD",
            ErrorKind::OperationFailed => "OPERATION_FAILED",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }

    /// Human-readable message for the UI layer. Store details are never
    /// exposed; the caller re-runs the action to retry.
    pub fn user_message(&self) -> String {
        match self {
            MarketError::Core(core) => match core {
                CoreError::NotFound { entity, .. } => format!("The {entity} no longer exists"),
                CoreError::Validation(msg)
                | CoreError::InvalidState(msg)
                | CoreError::NotOwner(msg) => msg.clone(),
                CoreError::DeniedByGuard { active_count, .. } => format!(
                    "Category is in use by {active_count} active listing(s). Only categories \
                     with no active items (available/pending) can be changed."
                ),
                CoreError::OperationFailed(_) => {
                    "The operation could not be completed, please try again".to_string()
                }
            },
            MarketError::Config(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tradeit_core::types::new_entity_id;

    #[test]
    fn store_not_found_maps_to_entity_not_found() {
        let id = new_entity_id();
        let err: MarketError = StoreError::NotFound {
            collection: "listings".into(),
            key: id,
        }
        .into();
        assert_matches!(
            err,
            MarketError::Core(CoreError::NotFound { entity: "listing", id: got }) if got == id
        );
    }

    #[test]
    fn unavailable_store_maps_to_operation_failed() {
        let err: MarketError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert_eq!(err.code(), "OPERATION_FAILED");
        assert!(!err.user_message().contains("down"));
    }

    #[test]
    fn guard_denial_message_names_count() {
        let err = MarketError::from(CoreError::DeniedByGuard {
            category_id: new_entity_id(),
            active_count: 2,
        });
        assert_eq!(err.kind(), ErrorKind::DeniedByGuard);
        assert!(err.user_message().contains("2 active listing"));
    }

    #[test]
    fn state_and_owner_messages_pass_through() {
        let err = MarketError::from(CoreError::InvalidState("Item no longer available".into()));
        assert_eq!(err.user_message(), "Item no longer available");
        assert_eq!(err.code(), "INVALID_STATE");

        let err = MarketError::from(CoreError::NotOwner("nope".into()));
        assert_eq!(err.kind(), ErrorKind::NotOwner);
    }
}

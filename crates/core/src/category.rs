//! Category title rules and the usage-guard decision.

use crate::error::CoreError;
use crate::types::EntityId;

/// Maximum length for a category title.
pub const MAX_TITLE_LENGTH: usize = 100;

/// Stored field names for categories.
pub const FIELD_CREATOR_ID: &str = "creator_id";
pub const FIELD_TITLE: &str = "title";

/// Validate a category title: required after trimming, bounded.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Category title is required".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Category title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Key used to detect duplicate titles regardless of case and padding.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Reject `title` if another category already uses it (case-insensitive).
///
/// `existing` yields `(id, title)` pairs; `exclude` skips the category being
/// renamed so that re-saving its own title is allowed.
pub fn check_unique_title<'a, I>(title: &str, existing: I, exclude: Option<EntityId>) -> Result<(), CoreError>
where
    I: IntoIterator<Item = (EntityId, &'a str)>,
{
    let wanted = normalize_title(title);
    let clash = existing
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .any(|(_, other)| normalize_title(other) == wanted);
    if clash {
        Err(CoreError::Validation(format!(
            "Category '{}' already exists",
            title.trim()
        )))
    } else {
        Ok(())
    }
}

/// Turn an active-listing count into the guard verdict.
pub fn guard_decision(category_id: EntityId, active_count: usize) -> Result<(), CoreError> {
    if active_count == 0 {
        Ok(())
    } else {
        Err(CoreError::DeniedByGuard {
            category_id,
            active_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::new_entity_id;
    use assert_matches::assert_matches;

    #[test]
    fn blank_title_rejected() {
        assert!(validate_title("  ").is_err());
        assert!(validate_title("Books").is_ok());
    }

    #[test]
    fn long_title_rejected() {
        assert!(validate_title(&"t".repeat(MAX_TITLE_LENGTH + 1)).is_err());
    }

    #[test]
    fn duplicate_title_is_case_insensitive() {
        let books = new_entity_id();
        let existing = vec![(books, "Books")];
        let result = check_unique_title(" books ", existing.iter().map(|(i, t)| (*i, *t)), None);
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("already exists"));
    }

    #[test]
    fn renaming_to_own_title_is_allowed() {
        let books = new_entity_id();
        let existing = vec![(books, "Books")];
        let result = check_unique_title("BOOKS", existing.iter().map(|(i, t)| (*i, *t)), Some(books));
        assert!(result.is_ok());
    }

    #[test]
    fn guard_allows_zero_and_denies_with_count() {
        let id = new_entity_id();
        assert!(guard_decision(id, 0).is_ok());
        assert_matches!(
            guard_decision(id, 3),
            Err(CoreError::DeniedByGuard { active_count: 3, .. })
        );
    }
}

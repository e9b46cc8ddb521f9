//! Listing lifecycle rules: statuses, party roles, and the precondition
//! checks every lifecycle transition runs before it writes.
//!
//! Everything here is pure. The coordinator in `tradeit-market` reads the
//! authoritative record, feeds it through these checks, and only then
//! patches the store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length for a listing name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length for a listing description.
pub const MAX_DESCRIPTION_LENGTH: usize = 5_000;

/// Stored field names. Patches are built from these so that a lifecycle
/// write never touches content fields and vice versa.
pub const FIELD_SELLER_ID: &str = "seller_id";
pub const FIELD_BUYER_ID: &str = "buyer_id";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_BUYER_CONFIRMED: &str = "buyer_confirmed";
pub const FIELD_SELLER_CONFIRMED: &str = "seller_confirmed";
pub const FIELD_CATEGORY_ID: &str = "category_id";
pub const FIELD_CATEGORY_TITLE: &str = "category_title";
pub const FIELD_NAME: &str = "name";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_DESCRIPTION: &str = "description";

/// Fields the seller may edit while the listing is available.
pub const CONTENT_FIELDS: &[&str] = &[FIELD_NAME, FIELD_PRICE, FIELD_DESCRIPTION, FIELD_CATEGORY_ID];

/// Fields only the lifecycle coordinator may write.
pub const LIFECYCLE_FIELDS: &[&str] = &[
    FIELD_BUYER_ID,
    FIELD_STATUS,
    FIELD_BUYER_CONFIRMED,
    FIELD_SELLER_CONFIRMED,
    FIELD_CATEGORY_TITLE,
];

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a listing. `Completed` is terminal and a listing
/// never re-enters `Available` once it has left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Pending,
    Completed,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Pending => "pending",
            ListingStatus::Completed => "completed",
        }
    }

    /// A listing is active until it completes. Active listings pin their
    /// category against rename and delete.
    pub fn is_active(self) -> bool {
        self != ListingStatus::Completed
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (ListingStatus::Available, ListingStatus::Pending)
                | (ListingStatus::Pending, ListingStatus::Completed)
        )
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

/// The side of the trade a caller acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Buyer,
    Seller,
}

impl PartyRole {
    /// The confirmation flag this role owns.
    pub fn confirmation_field(self) -> &'static str {
        match self {
            PartyRole::Buyer => FIELD_BUYER_CONFIRMED,
            PartyRole::Seller => FIELD_SELLER_CONFIRMED,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PartyRole::Buyer => "buyer",
            PartyRole::Seller => "seller",
        }
    }
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pending trade stands after a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    WaitingOnBuyer,
    WaitingOnSeller,
    Completed,
}

/// Derive the confirmation state from an authoritative read.
pub fn confirmation_state(
    status: ListingStatus,
    buyer_confirmed: bool,
    seller_confirmed: bool,
) -> ConfirmationState {
    if status == ListingStatus::Completed {
        ConfirmationState::Completed
    } else if !buyer_confirmed {
        ConfirmationState::WaitingOnBuyer
    } else if !seller_confirmed {
        ConfirmationState::WaitingOnSeller
    } else {
        // Both flags set but the completion write has not landed yet.
        ConfirmationState::Completed
    }
}

/// Both parties confirmed a still-pending listing: the completion write is due.
pub fn completion_due(status: ListingStatus, buyer_confirmed: bool, seller_confirmed: bool) -> bool {
    status.can_transition_to(ListingStatus::Completed) && buyer_confirmed && seller_confirmed
}

// ---------------------------------------------------------------------------
// Precondition checks
// ---------------------------------------------------------------------------

/// The caller must be the recorded seller.
pub fn check_seller(seller_id: &str, actor: &str) -> Result<(), CoreError> {
    if seller_id == actor {
        Ok(())
    } else {
        Err(CoreError::NotOwner(
            "Only the seller can modify this listing".to_string(),
        ))
    }
}

/// The listing must still be available for `action`.
pub fn check_available(status: ListingStatus, action: &str) -> Result<(), CoreError> {
    if status == ListingStatus::Available {
        Ok(())
    } else {
        Err(CoreError::InvalidState(format!(
            "Only available listings can be {action} (status is {status})"
        )))
    }
}

/// A buyer may claim a listing only while it is available, and never their own.
pub fn check_request(status: ListingStatus, seller_id: &str, buyer_id: &str) -> Result<(), CoreError> {
    if seller_id == buyer_id {
        return Err(CoreError::NotOwner(
            "A seller cannot request their own listing".to_string(),
        ));
    }
    if !status.can_transition_to(ListingStatus::Pending) {
        return Err(CoreError::InvalidState(
            "Item no longer available".to_string(),
        ));
    }
    Ok(())
}

/// A confirmation requires a pending listing and an actor matching the
/// recorded party for `role`.
pub fn check_confirm(
    status: ListingStatus,
    role: PartyRole,
    actor: &str,
    seller_id: &str,
    buyer_id: Option<&str>,
) -> Result<(), CoreError> {
    let recorded = match role {
        PartyRole::Seller => Some(seller_id),
        PartyRole::Buyer => buyer_id,
    };
    if recorded != Some(actor) {
        return Err(CoreError::NotOwner(format!(
            "Caller is not the {role} of this listing"
        )));
    }
    if status != ListingStatus::Pending {
        return Err(CoreError::InvalidState(format!(
            "Only pending listings can be confirmed (status is {status})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Content validation
// ---------------------------------------------------------------------------

/// Validate a listing name: required, trimmed, bounded.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Listing name is required".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Listing name exceeds maximum length of {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate a listing description: required, bounded.
pub fn validate_description(description: &str) -> Result<(), CoreError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Listing description is required".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Listing description exceeds maximum length of {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate a price. Zero means the item is free.
pub fn validate_price(price: f64) -> Result<(), CoreError> {
    if !price.is_finite() {
        return Err(CoreError::Validation("Price must be a number".to_string()));
    }
    if price < 0.0 {
        return Err(CoreError::Validation(format!(
            "Price must not be negative, got {price}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(ListingStatus::Pending).unwrap();
        assert_eq!(json, "pending");
        let back: ListingStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, ListingStatus::Pending);
    }

    #[test]
    fn only_completed_is_inactive() {
        assert!(ListingStatus::Available.is_active());
        assert!(ListingStatus::Pending.is_active());
        assert!(!ListingStatus::Completed.is_active());
    }

    #[test]
    fn transitions_move_forward_only() {
        use ListingStatus::*;
        assert!(Available.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Available));
        assert!(!Completed.can_transition_to(Available));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Available.can_transition_to(Completed));
    }

    #[test]
    fn confirmation_state_follows_flags() {
        use ListingStatus::*;
        assert_eq!(
            confirmation_state(Pending, false, true),
            ConfirmationState::WaitingOnBuyer
        );
        assert_eq!(
            confirmation_state(Pending, true, false),
            ConfirmationState::WaitingOnSeller
        );
        assert_eq!(
            confirmation_state(Completed, true, true),
            ConfirmationState::Completed
        );
    }

    #[test]
    fn completion_needs_both_flags_on_pending() {
        use ListingStatus::*;
        assert!(completion_due(Pending, true, true));
        assert!(!completion_due(Pending, true, false));
        assert!(!completion_due(Pending, false, true));
        assert!(!completion_due(Completed, true, true));
        assert!(!completion_due(Available, true, true));
    }

    #[test]
    fn request_on_own_listing_is_not_owner() {
        assert_matches!(
            check_request(ListingStatus::Available, "s", "s"),
            Err(CoreError::NotOwner(_))
        );
    }

    #[test]
    fn request_on_pending_listing_is_invalid_state() {
        assert_matches!(
            check_request(ListingStatus::Pending, "s", "b"),
            Err(CoreError::InvalidState(_))
        );
        assert_matches!(
            check_request(ListingStatus::Completed, "s", "b"),
            Err(CoreError::InvalidState(_))
        );
        assert!(check_request(ListingStatus::Available, "s", "b").is_ok());
    }

    #[test]
    fn confirm_requires_matching_party() {
        let ok = check_confirm(ListingStatus::Pending, PartyRole::Buyer, "b", "s", Some("b"));
        assert!(ok.is_ok());

        assert_matches!(
            check_confirm(ListingStatus::Pending, PartyRole::Buyer, "x", "s", Some("b")),
            Err(CoreError::NotOwner(_))
        );
        assert_matches!(
            check_confirm(ListingStatus::Pending, PartyRole::Seller, "b", "s", Some("b")),
            Err(CoreError::NotOwner(_))
        );
    }

    #[test]
    fn confirm_on_non_pending_is_invalid_state() {
        assert_matches!(
            check_confirm(ListingStatus::Available, PartyRole::Seller, "s", "s", None),
            Err(CoreError::InvalidState(_))
        );
        assert_matches!(
            check_confirm(ListingStatus::Completed, PartyRole::Buyer, "b", "s", Some("b")),
            Err(CoreError::InvalidState(_))
        );
    }

    #[test]
    fn seller_check() {
        assert!(check_seller("s", "s").is_ok());
        assert_matches!(check_seller("s", "b"), Err(CoreError::NotOwner(_)));
    }

    #[test]
    fn blank_name_rejected() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Desk lamp").is_ok());
    }

    #[test]
    fn long_name_rejected() {
        let name = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(validate_name(&name).is_err());
    }

    #[test]
    fn blank_description_rejected() {
        assert!(validate_description("").is_err());
        assert!(validate_description("Works fine").is_ok());
    }

    #[test]
    fn price_rules() {
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(12.5).is_ok());
        assert!(validate_price(-1.0).is_err());
        assert!(validate_price(f64::NAN).is_err());
        assert!(validate_price(f64::INFINITY).is_err());
    }

    #[test]
    fn content_and_lifecycle_fields_are_disjoint() {
        for field in CONTENT_FIELDS {
            assert!(!LIFECYCLE_FIELDS.contains(field));
        }
    }
}

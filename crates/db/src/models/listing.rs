//! Listing model and its create/update DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tradeit_core::listing::{
    confirmation_state, ConfirmationState, ListingStatus, FIELD_CATEGORY_ID, FIELD_DESCRIPTION,
    FIELD_NAME, FIELD_PRICE,
};
use tradeit_core::types::{EntityId, Timestamp, UserId};

use crate::store::Record;

/// A record from the `listings` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: EntityId,
    pub seller_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_id: Option<UserId>,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<EntityId>,
    /// Category title captured when the listing completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_title: Option<String>,
    pub price: f64,
    pub status: ListingStatus,
    #[serde(default)]
    pub buyer_confirmed: bool,
    #[serde(default)]
    pub seller_confirmed: bool,
    pub created_at: Timestamp,
}

impl Listing {
    /// Build a fresh `available` listing from a create request.
    pub fn new(id: EntityId, input: &CreateListing, created_at: Timestamp) -> Self {
        Self {
            id,
            seller_id: input.seller_id.clone(),
            buyer_id: None,
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            category_id: Some(input.category_id),
            category_title: None,
            price: input.price,
            status: ListingStatus::Available,
            buyer_confirmed: false,
            seller_confirmed: false,
            created_at,
        }
    }

    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether `user` is the seller or the recorded buyer.
    pub fn involves(&self, user: &str) -> bool {
        self.seller_id == user || self.buyer_id.as_deref() == Some(user)
    }

    pub fn confirmation_state(&self) -> ConfirmationState {
        confirmation_state(self.status, self.buyer_confirmed, self.seller_confirmed)
    }

    /// Check the record-level lifecycle invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.status {
            ListingStatus::Available => {
                if self.buyer_id.is_some() {
                    return Err("available listing has a buyer".to_string());
                }
                if self.buyer_confirmed || self.seller_confirmed {
                    return Err("available listing has confirmation flags set".to_string());
                }
            }
            ListingStatus::Pending => {
                if self.buyer_id.is_none() {
                    return Err("pending listing has no buyer".to_string());
                }
            }
            ListingStatus::Completed => {
                if self.buyer_id.is_none() {
                    return Err("completed listing has no buyer".to_string());
                }
                if !(self.buyer_confirmed && self.seller_confirmed) {
                    return Err("completed listing is missing a confirmation".to_string());
                }
            }
        }
        if self.price < 0.0 {
            return Err("negative price".to_string());
        }
        Ok(())
    }
}

/// DTO for creating a new listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListing {
    pub seller_id: UserId,
    pub name: String,
    pub description: String,
    pub category_id: EntityId,
    pub price: f64,
}

/// DTO for editing the content of an available listing. `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateListing {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<EntityId>,
}

impl UpdateListing {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category_id.is_none()
    }

    /// The minimal patch for this update: content fields only.
    pub fn to_fields(&self) -> Record {
        let mut fields = Record::new();
        if let Some(name) = &self.name {
            fields.insert(FIELD_NAME.into(), Value::from(name.trim()));
        }
        if let Some(description) = &self.description {
            fields.insert(FIELD_DESCRIPTION.into(), Value::from(description.trim()));
        }
        if let Some(price) = self.price {
            fields.insert(FIELD_PRICE.into(), Value::from(price));
        }
        if let Some(category_id) = self.category_id {
            fields.insert(FIELD_CATEGORY_ID.into(), Value::from(category_id.to_string()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tradeit_core::listing::{CONTENT_FIELDS, LIFECYCLE_FIELDS};
    use tradeit_core::types::new_entity_id;

    fn sample() -> Listing {
        let input = CreateListing {
            seller_id: "seller".into(),
            name: "  Desk lamp ".into(),
            description: "Warm light".into(),
            category_id: new_entity_id(),
            price: 0.0,
        };
        Listing::new(new_entity_id(), &input, Utc::now())
    }

    #[test]
    fn new_listing_is_available_and_trimmed() {
        let listing = sample();
        assert_eq!(listing.status, ListingStatus::Available);
        assert_eq!(listing.name, "Desk lamp");
        assert!(listing.is_free());
        assert!(listing.check_invariants().is_ok());
    }

    #[test]
    fn unset_buyer_is_not_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("buyer_id").is_none());
        assert_eq!(json["status"], "available");
    }

    #[test]
    fn invariants_catch_inconsistent_records() {
        let mut listing = sample();
        listing.status = ListingStatus::Pending;
        assert!(listing.check_invariants().is_err());

        listing.buyer_id = Some("buyer".into());
        assert!(listing.check_invariants().is_ok());

        listing.status = ListingStatus::Completed;
        listing.buyer_confirmed = true;
        assert!(listing.check_invariants().is_err());
    }

    #[test]
    fn update_patch_contains_only_content_fields() {
        let update = UpdateListing {
            name: Some(" Lamp ".into()),
            price: Some(5.0),
            ..Default::default()
        };
        let fields = update.to_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[FIELD_NAME], "Lamp");
        for key in fields.keys() {
            assert!(CONTENT_FIELDS.contains(&key.as_str()));
            assert!(!LIFECYCLE_FIELDS.contains(&key.as_str()));
        }
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(UpdateListing::default().is_empty());
    }
}

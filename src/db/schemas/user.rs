//! User profile document schema
//!
//! The `users` collection is keyed by uid. Documents are written by many
//! routes outside this service, so every field is optional and values of the
//! wrong type are read as absent instead of failing the request.

use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Collection name for user profiles
pub const USER_COLLECTION: &str = "users";

/// Nested `membership` object
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

/// Persisted per-user profile, as far as access control is concerned
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Capability flags (e.g. "visitor", "explorer")
    #[serde(default)]
    pub role_keys: BTreeSet<String>,

    /// Current membership; `membership.tier` wins over the legacy fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<Membership>,

    /// Legacy tier field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entitlement_tier: Option<String>,

    /// Oldest legacy tier field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_founder: Option<bool>,

    /// Free-form role label; only "founder" is meaningful here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// When the member accepted the programme terms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_terms_at: Option<DateTime<Utc>>,

    /// Sessions issued before this instant are revoked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_valid_after: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    /// `membership.tier`, if present
    pub fn membership_tier(&self) -> Option<&str> {
        self.membership.as_ref().and_then(|m| m.tier.as_deref())
    }

    /// Read a raw `users` document leniently.
    pub fn from_document(doc: &Document) -> Self {
        let role_keys = match doc.get("roleKeys") {
            Some(Bson::Array(items)) => items
                .iter()
                .filter_map(Bson::as_str)
                .map(str::to_string)
                .collect(),
            _ => BTreeSet::new(),
        };

        let membership = doc.get_document("membership").ok().map(|m| Membership {
            tier: str_field(m, "tier"),
        });

        Self {
            role_keys,
            membership,
            entitlement_tier: str_field(doc, "entitlementTier"),
            tier: str_field(doc, "tier"),
            is_founder: doc.get_bool("isFounder").ok(),
            role: str_field(doc, "role"),
            accepted_terms_at: datetime_field(doc, "acceptedTermsAt"),
            tokens_valid_after: datetime_field(doc, "tokensValidAfter"),
        }
    }
}

fn str_field(doc: &Document, key: &str) -> Option<String> {
    doc.get_str(key).ok().map(str::to_string)
}

fn datetime_field(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    doc.get_datetime(key).ok().map(|dt| dt.to_chrono())
}

/// Filter selecting a user document by uid
pub fn uid_filter(uid: &str) -> Document {
    doc! { "_id": uid }
}

/// Update setting `acceptedTermsAt`
pub fn accept_terms_update(at: DateTime<Utc>) -> Document {
    let at = bson::DateTime::from_chrono(at);
    doc! {
        "$set": {
            "acceptedTermsAt": at,
            "updatedAt": at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_document_full() {
        let now = Utc::now();
        let doc = doc! {
            "_id": "user-1",
            "roleKeys": ["visitor", "explorer", "explorer"],
            "membership": { "tier": "ACCELERATOR" },
            "entitlementTier": "starter",
            "tier": "FREE",
            "isFounder": false,
            "role": "member",
            "acceptedTermsAt": bson::DateTime::from_chrono(now),
        };

        let record = ProfileRecord::from_document(&doc);
        assert_eq!(record.role_keys.len(), 2);
        assert!(record.role_keys.contains("explorer"));
        assert_eq!(record.membership_tier(), Some("ACCELERATOR"));
        assert_eq!(record.entitlement_tier.as_deref(), Some("starter"));
        assert_eq!(record.is_founder, Some(false));
        assert_eq!(
            record.accepted_terms_at.map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[test]
    fn test_from_document_tolerates_wrong_types() {
        let doc = doc! {
            "_id": "user-2",
            "roleKeys": "visitor",
            "membership": "gold",
            "isFounder": "yes",
            "tier": 3,
        };

        let record = ProfileRecord::from_document(&doc);
        assert!(record.role_keys.is_empty());
        assert!(record.membership.is_none());
        assert!(record.is_founder.is_none());
        assert!(record.tier.is_none());
    }

    #[test]
    fn test_json_shape() {
        let record: ProfileRecord = serde_json::from_str(
            r#"{"membership": {"tier": "ACCELERATOR"}, "roleKeys": ["visitor", "explorer"]}"#,
        )
        .unwrap();
        assert_eq!(record.membership_tier(), Some("ACCELERATOR"));
        assert_eq!(record.role_keys.len(), 2);
        assert!(record.tier.is_none());
    }
}

//! Entitlement evaluation
//!
//! [`derive_tier`] is the only place tier precedence is decided. Route
//! handlers gate on an [`Entitlements`] value and never read the raw tier
//! fields of a profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::auth::session::Identity;
use crate::auth::tier::Tier;
use crate::db::schemas::ProfileRecord;
use crate::db::ProfileStore;
use crate::types::{GateError, Result};

/// Coarse capability flag, independent of tier ordering
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleKey(String);

impl RoleKey {
    /// Held by every authenticated identity
    pub const VISITOR: &'static str = "visitor";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn visitor() -> Self {
        Self::new(Self::VISITOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoleKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoleKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an identity is entitled to, derived from its profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    pub uid: String,
    /// Underlying tier; `Founder` is kept distinct from `Deepening`
    pub tier: Tier,
    /// Founder override, reported separately from `tier`
    pub is_founder: bool,
    pub roles: BTreeSet<RoleKey>,
    pub accepted_terms_at: Option<DateTime<Utc>>,
}

impl Entitlements {
    /// Build entitlements from an optional profile. A missing profile yields
    /// `FREE` with only the visitor role.
    pub fn from_profile(uid: impl Into<String>, profile: Option<&ProfileRecord>) -> Self {
        let (tier, is_founder) = profile.map(derive_tier).unwrap_or((Tier::Free, false));
        Self {
            uid: uid.into(),
            tier,
            is_founder,
            roles: derive_roles(profile),
            accepted_terms_at: profile.and_then(|p| p.accepted_terms_at),
        }
    }

    /// Tier for display and feature gating; Founder reads as Deepening
    pub fn gating_tier(&self) -> Tier {
        self.tier.gating()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Fail with `Forbidden` unless the role is held
    pub fn require_role(&self, role: &str) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(GateError::Forbidden(format!("Role '{}' required", role)))
        }
    }

    /// Fail with `Forbidden` unless the tier passes a `min` gate
    pub fn require_tier_at_least(&self, min: Tier) -> Result<()> {
        if self.tier.satisfies(min) {
            Ok(())
        } else {
            Err(GateError::Forbidden(format!(
                "Tier {} or higher required (current: {})",
                min, self.tier
            )))
        }
    }
}

/// Derive `(tier, is_founder)` from a profile. First match wins:
///
/// 1. `isFounder`, or `role` / `entitlementTier` equal to "founder"
/// 2. `membership.tier`
/// 3. `entitlementTier`
/// 4. `tier`
/// 5. `FREE`
///
/// Unrecognized tier strings count as absent.
pub fn derive_tier(profile: &ProfileRecord) -> (Tier, bool) {
    let founder_flag = profile.is_founder == Some(true)
        || is_founder_label(profile.role.as_deref())
        || is_founder_label(profile.entitlement_tier.as_deref());
    if founder_flag {
        return (Tier::Founder, true);
    }

    let tier = [
        profile.membership_tier(),
        profile.entitlement_tier.as_deref(),
        profile.tier.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(Tier::parse_stored)
    .unwrap_or_default();

    (tier, tier == Tier::Founder)
}

/// Profile role keys plus `visitor`
pub fn derive_roles(profile: Option<&ProfileRecord>) -> BTreeSet<RoleKey> {
    let mut roles: BTreeSet<RoleKey> = profile
        .map(|p| {
            p.role_keys
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(RoleKey::from)
                .collect()
        })
        .unwrap_or_default();
    roles.insert(RoleKey::visitor());
    roles
}

fn is_founder_label(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("founder"))
}

/// Fetches profiles and evaluates entitlements
#[derive(Clone)]
pub struct EntitlementEvaluator {
    store: Arc<dyn ProfileStore>,
}

impl EntitlementEvaluator {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Evaluate an identity's entitlements. One store read; store failures
    /// surface as `UpstreamUnavailable`.
    pub async fn evaluate(&self, identity: &Identity) -> Result<Entitlements> {
        let profile = self.store.get(&identity.uid).await?;
        let entitlements = Entitlements::from_profile(identity.uid.clone(), profile.as_ref());
        debug!(
            uid = %identity.uid,
            tier = %entitlements.tier,
            founder = entitlements.is_founder,
            profile_found = profile.is_some(),
            "Entitlements evaluated"
        );
        Ok(entitlements)
    }

    /// Evaluate and require a role
    pub async fn require_role(&self, identity: &Identity, role: &str) -> Result<Entitlements> {
        let entitlements = self.evaluate(identity).await?;
        entitlements.require_role(role)?;
        Ok(entitlements)
    }

    /// Evaluate and require a minimum tier
    pub async fn require_tier_at_least(
        &self,
        identity: &Identity,
        min: Tier,
    ) -> Result<Entitlements> {
        let entitlements = self.evaluate(identity).await?;
        entitlements.require_tier_at_least(min)?;
        Ok(entitlements)
    }
}

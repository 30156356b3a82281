//! Feature gates for member API routes
//!
//! Every gated route must appear here; unknown `/api/` feature paths are
//! not served.

use serde::Serialize;
use std::fmt;

use crate::auth::entitlements::Entitlements;
use crate::auth::tier::Tier;
use crate::types::Result;

/// Requirement a caller must meet to use a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Gate {
    /// Any role key
    Role(&'static str),
    /// Minimum tier
    Tier(Tier),
}

impl Gate {
    /// Check already evaluated entitlements against this gate
    pub fn check(&self, entitlements: &Entitlements) -> Result<()> {
        match self {
            Gate::Role(role) => entitlements.require_role(role),
            Gate::Tier(min) => entitlements.require_tier_at_least(*min),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Role(role) => write!(f, "role:{}", role),
            Gate::Tier(tier) => write!(f, "tier>={}", tier),
        }
    }
}

/// Get the gate for a feature route. Returns None for unknown routes.
pub fn get_required_gate(path: &str) -> Option<Gate> {
    match path {
        "/api/dashboard" => Some(Gate::Tier(Tier::Free)),
        "/api/journal" => Some(Gate::Role("explorer")),
        "/api/labs" => Some(Gate::Tier(Tier::AiBlueprint)),
        "/api/monetization" => Some(Gate::Tier(Tier::Accelerator)),
        _ => None,
    }
}

/// Human-readable feature name for responses and logs
pub fn get_feature_name(path: &str) -> &'static str {
    match path {
        "/api/dashboard" => "Dashboard",
        "/api/journal" => "Journal",
        "/api/labs" => "Labs",
        "/api/monetization" => "Monetization",
        _ => "Unknown feature",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{Membership, ProfileRecord};
    use std::collections::BTreeSet;

    fn entitlements(tier: &str, roles: &[&str]) -> Entitlements {
        Entitlements::from_profile(
            "u1",
            Some(&ProfileRecord {
                membership: Some(Membership {
                    tier: Some(tier.into()),
                }),
                role_keys: roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_unknown_routes_have_no_gate() {
        assert_eq!(get_required_gate("/api/admin"), None);
        assert_eq!(get_required_gate("/api/labs/extra"), None);
        assert_eq!(get_feature_name("/api/admin"), "Unknown feature");
    }

    #[test]
    fn test_dashboard_open_to_free() {
        let gate = get_required_gate("/api/dashboard").unwrap();
        assert!(gate.check(&entitlements("FREE", &[])).is_ok());
    }

    #[test]
    fn test_journal_requires_explorer() {
        let gate = get_required_gate("/api/journal").unwrap();
        assert!(gate.check(&entitlements("DEEPENING", &[])).is_err());
        assert!(gate.check(&entitlements("FREE", &["explorer"])).is_ok());
    }

    #[test]
    fn test_tier_gates() {
        let labs = get_required_gate("/api/labs").unwrap();
        let money = get_required_gate("/api/monetization").unwrap();

        assert!(labs.check(&entitlements("STARTER", &[])).is_err());
        assert!(labs.check(&entitlements("AI_BLUEPRINT", &[])).is_ok());
        assert!(money.check(&entitlements("AI_BLUEPRINT", &[])).is_err());
        assert!(money.check(&entitlements("ACCELERATOR", &[])).is_ok());
        assert!(money.check(&entitlements("FOUNDER", &[])).is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(Gate::Role("explorer").to_string(), "role:explorer");
        assert_eq!(Gate::Tier(Tier::AiBlueprint).to_string(), "tier>=AI_BLUEPRINT");
    }
}

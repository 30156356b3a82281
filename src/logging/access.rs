//! Access decision log
//!
//! Every gate decision is emitted as one structured event on the `access`
//! target, so decisions can be filtered or shipped separately from the
//! service's operational logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use tracing::{info, warn};

use crate::auth::Tier;
use crate::types::GateError;

/// Decision outcome
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allowed,
    Unauthenticated,
    Forbidden,
    RateLimited,
    UpstreamUnavailable,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Unauthenticated => "unauthenticated",
            Outcome::Forbidden => "forbidden",
            Outcome::RateLimited => "rate_limited",
            Outcome::UpstreamUnavailable => "upstream_unavailable",
            Outcome::Error => "error",
        }
    }
}

impl From<&GateError> for Outcome {
    fn from(err: &GateError) -> Self {
        match err {
            GateError::Unauthenticated(_) => Outcome::Unauthenticated,
            GateError::Forbidden(_) => Outcome::Forbidden,
            GateError::RateLimited { .. } => Outcome::RateLimited,
            GateError::UpstreamUnavailable(_) => Outcome::UpstreamUnavailable,
            _ => Outcome::Error,
        }
    }
}

/// One access decision
#[derive(Debug, Clone, Serialize)]
pub struct AccessEvent {
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub method: String,
    pub route: String,
    pub client_ip: Option<IpAddr>,
    /// Set once the session resolved
    pub uid: Option<String>,
    /// Set once entitlements were evaluated
    pub tier: Option<Tier>,
    /// Gate the route required, if any
    pub gate: Option<String>,
    /// Failure detail
    pub reason: Option<String>,
}

impl AccessEvent {
    /// Create a new access event
    pub fn new(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            outcome: Outcome::Allowed,
            method: method.into(),
            route: route.into(),
            client_ip: None,
            uid: None,
            tier: None,
            gate: None,
            reason: None,
        }
    }

    pub fn with_client(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Record a failure; the outcome follows the error kind
    pub fn with_error(mut self, err: &GateError) -> Self {
        self.outcome = Outcome::from(err);
        self.reason = Some(err.to_string());
        self
    }

    /// Emit the event
    pub fn emit(&self) {
        let client_ip = self.client_ip.map(|ip| ip.to_string());
        let tier = self.tier.map(|t| t.as_str());
        match self.outcome {
            Outcome::Allowed => info!(
                target: "access",
                outcome = self.outcome.as_str(),
                method = %self.method,
                route = %self.route,
                client_ip = client_ip.as_deref(),
                uid = self.uid.as_deref(),
                tier = tier,
                gate = self.gate.as_deref(),
                "access granted"
            ),
            _ => warn!(
                target: "access",
                outcome = self.outcome.as_str(),
                method = %self.method,
                route = %self.route,
                client_ip = client_ip.as_deref(),
                uid = self.uid.as_deref(),
                tier = tier,
                gate = self.gate.as_deref(),
                reason = self.reason.as_deref(),
                "access denied"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_outcome_follows_error_kind() {
        let mut event = AccessEvent::new("GET", "/api/labs");
        event.uid = Some("u1".into());
        event.tier = Some(Tier::Starter);
        let event =
            event.with_error(&GateError::Forbidden("Tier AI_BLUEPRINT or higher required".into()));
        assert_eq!(event.outcome, Outcome::Forbidden);
        assert_eq!(event.uid.as_deref(), Some("u1"));
        assert_eq!(event.tier, Some(Tier::Starter));

        let event = AccessEvent::new("GET", "/api/user").with_error(&GateError::RateLimited {
            retry_after: Duration::from_secs(3),
        });
        assert_eq!(event.outcome, Outcome::RateLimited);
    }

    #[test]
    fn test_serializes_snake_case_outcome() {
        let event = AccessEvent::new("GET", "/api/user")
            .with_error(&GateError::Unauthenticated("No session token".into()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "unauthenticated");
        assert_eq!(json["route"], "/api/user");
    }
}

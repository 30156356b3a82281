//! Current member endpoint (`GET /api/user`)
//!
//! Reports the caller's entitlements exactly as the evaluator derived them.

use chrono::{DateTime, Utc};
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::auth::{RoleKey, Tier};
use crate::logging::AccessEvent;
use crate::server::guard::authorize;
use crate::server::response::{json_response, FullBody};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub uid: String,
    pub email_verified: bool,
    pub tier: Tier,
    /// Tier used by the client for feature gating (Founder reads as Deepening)
    pub gating_tier: Tier,
    pub is_founder: bool,
    pub roles: BTreeSet<RoleKey>,
    pub accepted_terms: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_terms_at: Option<DateTime<Utc>>,
}

pub async fn handle_get_user(
    state: &AppState,
    headers: &HeaderMap,
    event: &mut AccessEvent,
) -> Result<Response<FullBody>> {
    let (identity, entitlements) = authorize(state, headers, event).await?;

    let body = UserResponse {
        uid: identity.uid,
        email_verified: identity.email_verified,
        tier: entitlements.tier,
        gating_tier: entitlements.gating_tier(),
        is_founder: entitlements.is_founder,
        accepted_terms: entitlements.accepted_terms_at.is_some(),
        accepted_terms_at: entitlements.accepted_terms_at,
        roles: entitlements.roles,
    };
    Ok(json_response(StatusCode::OK, &body))
}

//! Gated member features (`/api/dashboard`, `/api/journal`, `/api/labs`,
//! `/api/monetization`)
//!
//! Feature content is served elsewhere; these routes answer whether the
//! caller may use the feature and with which entitlements.

use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;

use crate::auth::{get_feature_name, Gate, Tier};
use crate::logging::AccessEvent;
use crate::server::guard::authorize;
use crate::server::response::{json_response, FullBody};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResponse {
    pub feature: &'static str,
    pub gate: Gate,
    pub uid: String,
    pub tier: Tier,
    pub gating_tier: Tier,
    pub is_founder: bool,
}

pub async fn handle_feature(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    gate: Gate,
    event: &mut AccessEvent,
) -> Result<Response<FullBody>> {
    event.gate = Some(gate.to_string());
    let (identity, entitlements) = authorize(state, headers, event).await?;
    gate.check(&entitlements)?;

    Ok(json_response(
        StatusCode::OK,
        &FeatureResponse {
            feature: get_feature_name(path),
            gate,
            uid: identity.uid,
            tier: entitlements.tier,
            gating_tier: entitlements.gating_tier(),
            is_founder: entitlements.is_founder,
        },
    ))
}

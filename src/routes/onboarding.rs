//! Onboarding terms acceptance (`POST /api/onboarding/accept`)
//!
//! The only write this service performs on a profile.

use chrono::Utc;
use hyper::{HeaderMap, Response, StatusCode};
use serde_json::json;

use crate::logging::AccessEvent;
use crate::server::guard::authenticate;
use crate::server::response::{json_response, FullBody};
use crate::server::AppState;
use crate::types::Result;

pub async fn handle_accept_terms(
    state: &AppState,
    headers: &HeaderMap,
    event: &mut AccessEvent,
) -> Result<Response<FullBody>> {
    let identity = authenticate(state, headers, event).await?;
    let accepted_at = Utc::now();

    state.store.accept_terms(&identity.uid, accepted_at).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "ok": true,
            "acceptedTermsAt": accepted_at,
        }),
    ))
}

//! Request guards
//!
//! The only sanctioned way for a route to learn who is calling and what they
//! are entitled to. Authentication always runs before any profile read.

use hyper::HeaderMap;

use crate::auth::{extract_session_token, Entitlements, Identity};
use crate::logging::AccessEvent;
use crate::server::AppState;
use crate::types::Result;

/// Resolve the caller's session (401 on failure)
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    event: &mut AccessEvent,
) -> Result<Identity> {
    let token = extract_session_token(headers, &state.args.session_cookie_name);
    let identity = state.sessions.resolve(token.as_deref()).await?;
    event.uid = Some(identity.uid.clone());
    Ok(identity)
}

/// Resolve the caller's session and evaluate entitlements
pub async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    event: &mut AccessEvent,
) -> Result<(Identity, Entitlements)> {
    let identity = authenticate(state, headers, event).await?;
    let entitlements = state.entitlements.evaluate(&identity).await?;
    event.tier = Some(entitlements.tier);
    Ok((identity, entitlements))
}

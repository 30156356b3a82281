//! Liveness endpoint (`/health`, `/healthz`)
//!
//! Never rate limited and never authenticated.

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::server::response::{json_response, FullBody};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub node_id: String,
    /// "development" or "production"
    pub mode: &'static str,
    /// Profile store backend
    pub store: &'static str,
    pub rate_limiter: RateLimiterHealth,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterHealth {
    /// Keys currently tracked
    pub keys: usize,
}

pub fn health_check(state: &AppState) -> Response<FullBody> {
    let body = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        node_id: state.args.node_id.to_string(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        store: state.store.kind(),
        rate_limiter: RateLimiterHealth {
            keys: state.limiter.stats().keys,
        },
    };
    json_response(StatusCode::OK, &body)
}

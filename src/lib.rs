//! iPurpose gate - access control for the iPurpose member API
//!
//! Three independent pieces guard every member route:
//!
//! - **Rate limiting**: in-process fixed-window counters keyed by client
//! - **Sessions**: session token -> [`auth::Identity`] (401 on failure)
//! - **Entitlements**: stored profile -> tier and roles (403 on failure)
//!
//! The rate limiter is process-local. Horizontally scaled deployments each
//! enforce their own windows.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod ratelimit;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{GateError, Result};

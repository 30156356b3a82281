//! Request rate limiting
//!
//! A best-effort, single-process guard consulted before session resolution.
//! Keys are usually client IPs.

pub mod limiter;

pub use limiter::{
    spawn_sweep_task, RateLimitDecision, RateLimitPolicy, RateLimitStats, RateLimiter,
};

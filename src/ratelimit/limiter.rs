//! Fixed-window rate limiter
//!
//! Counts requests per key in process memory. Each window starts at the
//! first request for a key and is replaced (not extended) once it closes.
//!
//! State is local to one process: it is lost on restart and not shared
//! between instances, so N instances admit up to N times the policy.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::types::{GateError, Result};

/// Requests allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    requests: u32,
    window: Duration,
}

impl RateLimitPolicy {
    /// Both values must be non-zero
    pub fn new(requests: u32, window: Duration) -> Result<Self> {
        if requests == 0 {
            return Err(GateError::Config("rate limit requests must be > 0".into()));
        }
        if window.is_zero() {
            return Err(GateError::Config("rate limit window must be > 0".into()));
        }
        Ok(Self { requests, window })
    }

    /// Convenience constructor taking the window in milliseconds
    pub fn per_millis(requests: u32, window_ms: u64) -> Result<Self> {
        Self::new(requests, Duration::from_millis(window_ms))
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        /// Requests left in this window
        remaining: u32,
        reset_at: Instant,
    },
    Denied {
        reset_at: Instant,
        /// Time until the window closes, from the instant of the check
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    /// Map a denial to `GateError::RateLimited`
    pub fn into_result(self) -> Result<()> {
        match self {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Denied { retry_after, .. } => {
                Err(GateError::RateLimited { retry_after })
            }
        }
    }
}

/// Per-key window state
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

/// Limiter statistics
#[derive(Debug, Clone, Default)]
pub struct RateLimitStats {
    pub keys: usize,
}

/// In-memory fixed-window rate limiter
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    /// How long past `reset_at` an entry survives a sweep
    grace: Duration,
}

impl RateLimiter {
    pub fn new(grace: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            grace,
        }
    }

    /// Check and count a request for `key`
    pub fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        self.check_at(key, policy, Instant::now())
    }

    /// Check and count a request for `key` at an explicit instant.
    ///
    /// The read-modify-write runs while holding the key's shard lock, so
    /// concurrent checks on one key are serialized.
    pub fn check_at(&self, key: &str, policy: &RateLimitPolicy, now: Instant) -> RateLimitDecision {
        let fresh = RateLimitEntry {
            count: 1,
            reset_at: now + policy.window,
        };

        match self.entries.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                allowed(policy, fresh)
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if now > entry.reset_at {
                    *entry = fresh;
                    allowed(policy, fresh)
                } else if entry.count < policy.requests {
                    entry.count += 1;
                    allowed(policy, *entry)
                } else {
                    debug!(key = key, count = entry.count, "Rate limit exceeded");
                    RateLimitDecision::Denied {
                        reset_at: entry.reset_at,
                        retry_after: entry.reset_at.saturating_duration_since(now),
                    }
                }
            }
        }
    }

    /// Forget a key's window
    pub fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove entries whose window closed more than the grace period ago
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Sweep at an explicit instant.
    ///
    /// Each entry is judged under its shard lock, so an entry refreshed by a
    /// concurrent check is never removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let grace = self.grace;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.reset_at + grace >= now;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!(removed = removed, "Swept closed rate-limit windows");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            keys: self.entries.len(),
        }
    }
}

fn allowed(policy: &RateLimitPolicy, entry: RateLimitEntry) -> RateLimitDecision {
    RateLimitDecision::Allowed {
        remaining: policy.requests.saturating_sub(entry.count),
        reset_at: entry.reset_at,
    }
}

/// Spawn a background task that sweeps the limiter on a fixed interval
pub fn spawn_sweep_task(limiter: Arc<RateLimiter>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            debug!(
                removed = removed,
                keys = limiter.len(),
                "Rate limiter sweep completed"
            );
        }
    });

    info!("Rate limiter sweep task started (every {:?})", interval);
}

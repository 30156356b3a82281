//! Configuration for the gate
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::jwt::MIN_SECRET_LEN;
use crate::ratelimit::RateLimitPolicy;
use crate::types::Result;

/// Where profiles are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Mongo,
    Memory,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// iPurpose gate - session, entitlement and rate-limit checks for member routes
#[derive(Parser, Debug, Clone)]
#[command(name = "ipurpose-gate")]
#[command(about = "Access-control gate for the iPurpose member API")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (fixed session secret, memory store fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Session signing secret (required in production)
    #[arg(long, env = "SESSION_SECRET")]
    pub session_secret: Option<String>,

    /// Name of the cookie carrying the session token
    #[arg(long, env = "SESSION_COOKIE_NAME", default_value = "__session")]
    pub session_cookie_name: String,

    /// Session lifetime in seconds for tokens issued by this service
    #[arg(long, env = "SESSION_EXPIRY_SECONDS", default_value = "3600")]
    pub session_expiry_seconds: u64,

    /// Profile store backend
    #[arg(long, env = "STORE", value_enum, default_value = "mongo")]
    pub store: StoreKind,

    /// JSON file of `{uid: profile}` to seed the memory store with
    #[arg(long, env = "MEMORY_SEED")]
    pub memory_seed: Option<PathBuf>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ipurpose")]
    pub mongodb_db: String,

    /// Requests per window per client for read routes
    #[arg(long, env = "RATE_LIMIT_REQUESTS", default_value = "60")]
    pub rate_limit_requests: u32,

    /// Requests per window per client for mutating routes
    #[arg(long, env = "RATE_LIMIT_WRITE_REQUESTS", default_value = "10")]
    pub rate_limit_write_requests: u32,

    /// Rate-limit window length in milliseconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS", default_value = "60000")]
    pub rate_limit_window_ms: u64,

    /// How often closed windows are swept, in milliseconds
    #[arg(long, env = "RATE_LIMIT_SWEEP_INTERVAL_MS", default_value = "60000")]
    pub rate_limit_sweep_interval_ms: u64,

    /// How long a closed window is kept before sweeping (defaults to the sweep interval)
    #[arg(long, env = "RATE_LIMIT_GRACE_MS")]
    pub rate_limit_grace_ms: Option<u64>,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Args {
    /// Policy for read routes
    pub fn read_policy(&self) -> Result<RateLimitPolicy> {
        RateLimitPolicy::per_millis(self.rate_limit_requests, self.rate_limit_window_ms)
    }

    /// Policy for mutating routes
    pub fn write_policy(&self) -> Result<RateLimitPolicy> {
        RateLimitPolicy::per_millis(self.rate_limit_write_requests, self.rate_limit_window_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_sweep_interval_ms)
    }

    /// Grace period for closed windows, defaulting to the sweep interval
    pub fn sweep_grace(&self) -> Duration {
        self.rate_limit_grace_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.sweep_interval())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode {
            match &self.session_secret {
                None => return Err("SESSION_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "SESSION_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
        }

        if self.session_cookie_name.trim().is_empty() {
            return Err("SESSION_COOKIE_NAME must not be empty".to_string());
        }

        self.read_policy().map_err(|e| e.to_string())?;
        self.write_policy().map_err(|e| e.to_string())?;

        if self.rate_limit_sweep_interval_ms == 0 {
            return Err("RATE_LIMIT_SWEEP_INTERVAL_MS must be greater than 0".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than 0".to_string());
        }

        if self.store == StoreKind::Mongo && self.memory_seed.is_some() {
            return Err("MEMORY_SEED only applies with STORE=memory".to_string());
        }

        Ok(())
    }
}

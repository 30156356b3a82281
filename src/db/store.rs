//! Profile store trait

use chrono::{DateTime, Utc};

use crate::db::schemas::ProfileRecord;
use crate::types::Result;

/// Keyed access to the `users` collection.
///
/// Implementations report outages as `GateError::UpstreamUnavailable`;
/// a missing document is `Ok(None)`, not an error.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile for a uid
    async fn get(&self, uid: &str) -> Result<Option<ProfileRecord>>;

    /// Record terms acceptance, creating the document if needed
    async fn accept_terms(&self, uid: &str, at: DateTime<Utc>) -> Result<()>;

    /// Short label for health output and logs
    fn kind(&self) -> &'static str;
}

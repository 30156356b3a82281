//! In-memory profile store
//!
//! Used in dev mode when MongoDB is unreachable, and by tests. Can be seeded
//! from a JSON object mapping uid to profile.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::auth::RevocationSource;
use crate::db::schemas::ProfileRecord;
use crate::db::store::ProfileStore;
use crate::types::{GateError, Result};

/// Thread-safe in-memory `users` collection
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<String, ProfileRecord>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load profiles from a JSON file of the form `{"<uid>": {...}}`
    pub fn from_seed_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let seeded: HashMap<String, ProfileRecord> = serde_json::from_str(&raw).map_err(|e| {
            GateError::Config(format!("Invalid seed file {}: {}", path.display(), e))
        })?;

        let store = Self::new();
        for (uid, profile) in seeded {
            store.insert(uid, profile);
        }
        info!(
            "Seeded in-memory profile store with {} profile(s) from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    /// Insert or replace a profile
    pub fn insert(&self, uid: impl Into<String>, profile: ProfileRecord) {
        self.profiles.insert(uid.into(), profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, uid: &str) -> Result<Option<ProfileRecord>> {
        Ok(self.profiles.get(uid).map(|p| p.clone()))
    }

    async fn accept_terms(&self, uid: &str, at: DateTime<Utc>) -> Result<()> {
        self.profiles
            .entry(uid.to_string())
            .or_default()
            .accepted_terms_at = Some(at);
        debug!(uid = uid, "Terms accepted (memory store)");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[async_trait::async_trait]
impl RevocationSource for MemoryProfileStore {
    async fn tokens_valid_after(&self, uid: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .profiles
            .get(uid)
            .and_then(|p| p.tokens_valid_after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn seed_path() -> PathBuf {
        std::env::temp_dir().join(format!("ipurpose-seed-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryProfileStore::new();
        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accept_terms_creates_document() {
        let store = MemoryProfileStore::new();
        let now = Utc::now();

        store.accept_terms("user-1", now).await.unwrap();

        let profile = store.get("user-1").await.unwrap().expect("created");
        assert_eq!(profile.accepted_terms_at, Some(now));
        assert!(profile.role_keys.is_empty());
    }

    #[tokio::test]
    async fn test_accept_terms_keeps_other_fields() {
        let store = MemoryProfileStore::new();
        let mut profile = ProfileRecord::default();
        profile.tier = Some("STARTER".into());
        store.insert("user-1", profile);

        store.accept_terms("user-1", Utc::now()).await.unwrap();

        let profile = store.get("user-1").await.unwrap().unwrap();
        assert_eq!(profile.tier.as_deref(), Some("STARTER"));
        assert!(profile.accepted_terms_at.is_some());
    }

    #[test]
    fn test_seed_file() {
        let path = seed_path();
        std::fs::write(
            &path,
            r#"{"u1": {"membership": {"tier": "STARTER"}}, "u2": {"isFounder": true}}"#,
        )
        .unwrap();

        let store = MemoryProfileStore::from_seed_file(&path).unwrap();
        assert_eq!(store.len(), 2);

        let founder = tokio_test::block_on(store.get("u2")).unwrap().unwrap();
        assert_eq!(founder.is_founder, Some(true));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_seed_file_invalid_json() {
        let path = seed_path();
        std::fs::write(&path, "not json").unwrap();

        let result = MemoryProfileStore::from_seed_file(&path);
        assert!(matches!(result, Err(GateError::Config(_))));
        std::fs::remove_file(&path).ok();
    }
}

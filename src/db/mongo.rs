//! MongoDB client and profile store
//!
//! Documents are read as raw BSON and converted leniently, since the
//! `users` collection is shared with routes that write whatever they need.

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::{Client, Collection};
use tracing::{debug, info};

use crate::auth::RevocationSource;
use crate::db::schemas::{accept_terms_update, uid_filter, ProfileRecord, USER_COLLECTION};
use crate::db::store::ProfileStore;
use crate::types::{GateError, Result};

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| {
                GateError::UpstreamUnavailable(format!("Failed to connect to MongoDB: {}", e))
            })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| GateError::UpstreamUnavailable(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Untyped collection handle
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection::<Document>(name)
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Profile store backed by the `users` collection
#[derive(Clone)]
pub struct MongoProfileStore {
    users: Collection<Document>,
}

impl MongoProfileStore {
    pub fn new(client: &MongoClient) -> Self {
        Self {
            users: client.collection(USER_COLLECTION),
        }
    }

    async fn find_user(&self, uid: &str) -> Result<Option<Document>> {
        Ok(self.users.find_one(uid_filter(uid)).await?)
    }
}

#[async_trait::async_trait]
impl ProfileStore for MongoProfileStore {
    async fn get(&self, uid: &str) -> Result<Option<ProfileRecord>> {
        let found = self.find_user(uid).await?;
        debug!(uid = uid, found = found.is_some(), "Profile lookup");
        Ok(found.as_ref().map(ProfileRecord::from_document))
    }

    async fn accept_terms(&self, uid: &str, at: DateTime<Utc>) -> Result<()> {
        self.users
            .update_one(uid_filter(uid), accept_terms_update(at))
            .upsert(true)
            .await?;
        info!(uid = uid, "Terms accepted");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "mongo"
    }
}

#[async_trait::async_trait]
impl RevocationSource for MongoProfileStore {
    async fn tokens_valid_after(&self, uid: &str) -> Result<Option<DateTime<Utc>>> {
        let found = self.find_user(uid).await?;
        Ok(found
            .as_ref()
            .and_then(|d| d.get_datetime("tokensValidAfter").ok())
            .map(|dt| dt.to_chrono()))
    }
}


//! iPurpose gate - access control for the iPurpose member API

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use ipurpose_gate::{
    auth::{JwtSessionVerifier, RevocationSource},
    config::{Args, StoreKind},
    db::{MemoryProfileStore, MongoClient, MongoProfileStore, ProfileStore},
    logging,
    ratelimit::RateLimiter,
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  iPurpose gate");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {:?}", args.store);
    info!(
        "Rate limit: {} read / {} write per {}ms",
        args.rate_limit_requests, args.rate_limit_write_requests, args.rate_limit_window_ms
    );
    info!("======================================");

    let (store, revocations) = open_store(&args).await?;

    let verifier = match &args.session_secret {
        Some(secret) => JwtSessionVerifier::new(secret.clone(), args.session_expiry_seconds)?,
        None => JwtSessionVerifier::new_dev(),
    }
    .with_revocations(revocations);

    let limiter = Arc::new(RateLimiter::new(args.sweep_grace()));
    let state = Arc::new(server::AppState::new(
        args,
        Arc::new(verifier),
        store,
        limiter,
    )?);

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Open the configured profile store. A failed MongoDB connection falls back
/// to an empty memory store in dev mode and is fatal otherwise.
async fn open_store(
    args: &Args,
) -> anyhow::Result<(Arc<dyn ProfileStore>, Arc<dyn RevocationSource>)> {
    if args.store == StoreKind::Mongo {
        match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => {
                info!("MongoDB connected successfully");
                let store = Arc::new(MongoProfileStore::new(&client));
                let profiles: Arc<dyn ProfileStore> = store.clone();
                let revocations: Arc<dyn RevocationSource> = store;
                return Ok((profiles, revocations));
            }
            Err(e) if args.dev_mode => {
                warn!("MongoDB connection failed (dev mode, using memory store): {}", e);
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let store = Arc::new(match &args.memory_seed {
        Some(path) => MemoryProfileStore::from_seed_file(path)?,
        None => MemoryProfileStore::new(),
    });
    if store.is_empty() {
        warn!("Memory profile store is empty; every member resolves to the FREE tier");
    }
    let profiles: Arc<dyn ProfileStore> = store.clone();
    let revocations: Arc<dyn RevocationSource> = store;
    Ok((profiles, revocations))
}

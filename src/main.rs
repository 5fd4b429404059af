//! Agora - Q&A forum service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agora::{
    auth::JwtValidator,
    config::Args,
    db::MongoClient,
    server::{self, AppState},
    store::{ForumStore, MemoryForumStore, MongoForumStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("agora={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Agora - Q&A forum");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    if args.memory_store {
        info!("Store: in-memory");
    } else {
        info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    }
    info!("======================================");

    let jwt = match &args.jwt_secret {
        Some(secret) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?,
        None => {
            warn!("JWT_SECRET not set, using the development secret");
            JwtValidator::new_dev()
        }
    };

    let store = open_store(&args).await?;
    let state = Arc::new(AppState::new(args, store, jwt));

    server::run(state).await?;
    Ok(())
}

/// MongoDB unless `--memory-store`; dev mode falls back to memory when MongoDB is down
async fn open_store(args: &Args) -> anyhow::Result<Arc<dyn ForumStore>> {
    if args.memory_store {
        return Ok(Arc::new(MemoryForumStore::new()));
    }

    let connected = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => MongoForumStore::new(&client).await,
        Err(e) => Err(e),
    };

    match connected {
        Ok(store) => {
            info!("MongoDB connected successfully");
            Ok(Arc::new(store))
        }
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
            Ok(Arc::new(MemoryForumStore::new()))
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            Err(e.into())
        }
    }
}

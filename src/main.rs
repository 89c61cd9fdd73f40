mod commands;
mod config;
mod dispatch;
mod ingest;
mod link;
mod mapper;
mod model;
mod platform;
mod store;
mod ttl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::ingest::App;
use crate::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,funnelbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Database: {}", config.database.path.display());
    info!("  Link secret TTL: {}s", config.linking.secret_ttl_secs);

    let store = Store::open(&config.database.path)?;

    let bot = teloxide::Bot::new(&config.telegram.bot_token);
    let app = Arc::new(App::new(config, store));

    info!("Bot is starting...");
    platform::telegram::run(app, bot).await?;

    Ok(())
}

//! Linkrelay - Discord link relay bot
//!
//! Watches guild messages for URLs, sorts them by site and reposts them
//! through webhooks into the output channels administrators configured,
//! removing the original message once delivered.

mod admin;
mod common;
mod config;
mod discord;
mod links;
mod registry;
mod relay;
mod store;

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use config::env::get_config_path;
use config::{load_and_validate, StorageBackend, StorageConfig};
use discord::DiscordBotBuilder;
use store::{JsonFileStore, MemoryStore, SharedStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Linkrelay v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = get_config_path();
    let config = load_and_validate().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists or LINKRELAY_DISCORD_TOKEN is set.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Command prefix: {}", config.discord.command_prefix);
    info!("  Storage: {} ({})", config.storage.backend, config.storage.path);
    info!("  Webhook name: {}", config.relay.webhook_name);

    let store = open_store(&config.storage).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let discord_bot = DiscordBotBuilder::new(config, store, shutdown_rx)
        .build()
        .await?;

    info!("Starting Discord bot...");
    let mut discord_task = tokio::spawn(async move {
        discord_bot.run().await;
    });

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - stopping...");
            true
        }
        _ = &mut discord_task => false,
    };

    if shutdown {
        if let Err(e) = shutdown_tx.send(true) {
            debug!("Shutdown channel closed (bot already exited): {}", e);
        }
        let timeout = tokio::time::Duration::from_secs(5);
        match tokio::time::timeout(timeout, discord_task).await {
            Ok(Ok(())) => info!("Discord bot stopped gracefully"),
            Ok(Err(e)) => warn!("Discord task panicked: {}", e),
            Err(_) => warn!("Discord shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn open_store(storage: &StorageConfig) -> Result<SharedStore> {
    match storage.backend_kind() {
        Some(StorageBackend::Memory) => {
            warn!("Using in-memory storage; configuration is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        Some(StorageBackend::File) => {
            let store = JsonFileStore::open(&storage.path).await?;
            info!("Opened store at {}", store.path().display());
            Ok(Arc::new(store))
        }
        None => anyhow::bail!("Unknown storage backend '{}'", storage.backend),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

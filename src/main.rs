//! Archibridge - Discord relay for Archipelago multiworld sessions.
//!
//! Connects to an Archipelago server as a text-only client, posts classified
//! server messages to Discord channels and relays the Discord chat channel
//! back to the server.

mod bridge;
mod common;
mod config;
mod discord;
mod game;
mod protocol;
mod setup;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, error, info, warn};

use bridge::{ChannelBundle, ChannelMap, Relay};
use config::{env::get_config_path, load_and_validate};
use discord::{BridgeHandler, CommandHandler, DiscordBotBuilder, DiscordChannels, MentionResolver, MessageResolver};
use game::Upstream;
use protocol::WsConnector;
use setup::{SessionStore, SettingsApplier, SetupWizard, SWEEP_INTERVAL};
use storage::{Database, SettingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Archibridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let mut config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    let db = Arc::new(Database::open(&config.storage.path).await?);
    info!("Opened database {}", config.storage.path);

    match db.load_settings().await {
        Ok(Some(saved)) => {
            info!("Using relay settings saved by /setup");
            saved.apply_to(&mut config);
        }
        Ok(None) => {}
        Err(e) => warn!("Ignoring saved relay settings: {}", e),
    }

    info!("Configuration loaded successfully");
    info!("  Archipelago server: {}", config.archipelago.server);
    info!("  Slot: {}", config.archipelago.slot);
    info!("  Tags: {:?}", config.archipelago.tags);

    // ============================================================
    // Shared state and channels
    // ============================================================
    let channels = ChannelBundle::new(config.archipelago.clone());
    let channel_map = ChannelMap::new(config.discord.channels.clone());
    info!("Mapped categories: {:?}", channel_map.configured());

    let mentions = MentionResolver::new(db.clone())?;
    let relay = Arc::new(Relay::from_config(&config.relay, mentions, channel_map.clone()));

    let wizard = Arc::new(SetupWizard::new(
        SessionStore::new(Duration::from_secs(config.relay.session_ttl_secs)),
        db.clone(),
        SettingsApplier {
            channels: channel_map.clone(),
            target_tx: channels.discord.target_tx,
            command_tx: channels.discord.command_tx.clone(),
        },
        config.archipelago.tags.clone(),
    ));

    let commands = CommandHandler::new(
        db.clone(),
        channel_map.clone(),
        channels.discord.command_tx,
        channels.discord.status_rx.clone(),
    );

    let handler = BridgeHandler::new(
        relay.clone(),
        MessageResolver::new()?,
        commands,
        wizard.clone(),
        channels.discord.outgoing_tx,
        config.discord.guild_id,
        config.discord.enable_commands,
    );

    let shutdown_tx = channels.control.shutdown_tx;

    // ============================================================
    // Discord
    // ============================================================
    let discord_channels = DiscordChannels {
        event_rx: channels.discord.event_rx,
        status_rx: channels.discord.status_rx,
        shutdown_rx: shutdown_tx.subscribe(),
    };
    let discord_bot = DiscordBotBuilder::new(config.discord.token.clone(), discord_channels, handler)
        .build()
        .await?;

    info!("Starting Discord bot...");
    let discord_task = tokio::spawn(discord_bot.run());

    // ============================================================
    // Archipelago
    // ============================================================
    let upstream = Upstream::new(
        WsConnector,
        relay,
        config.reconnect.to_reconnect_config(),
        channels.upstream,
    );
    let mut upstream_task = tokio::spawn(upstream.run());

    // Expired setup sessions
    let sweep_task = {
        let wizard = wizard.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = wizard.sessions().sweep_expired();
                        if removed > 0 {
                            debug!("Swept {} expired setup sessions", removed);
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        })
    };

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            true
        }
        _ = &mut upstream_task => false,
        _ = discord_task => false,
    };

    if let Err(e) = shutdown_tx.send(true) {
        debug!("Shutdown channel closed: {}", e);
    }
    if shutdown {
        let timeout = Duration::from_secs(5);
        match tokio::time::timeout(timeout, upstream_task).await {
            Ok(Ok(())) => info!("Archipelago connection closed"),
            Ok(Err(e)) => warn!("Upstream task panicked: {}", e),
            Err(_) => warn!("Archipelago disconnect timed out"),
        }
    }
    sweep_task.abort();

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

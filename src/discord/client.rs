//! Discord bot client.
//!
//! Gateway events are forwarded from serenity's handler into a channel and
//! processed by a single loop alongside relay events, status changes and
//! shutdown. Gateway reconnection is driven by an exponential backoff.

use std::time::Duration;

use backon::BackoffBuilder;
use serenity::all::Interaction;
use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::Guild;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::common::error::DiscordError;
use crate::common::messages::{ActivityStatus, ClassifiedEvent};
use crate::discord::handler::BridgeHandler;

#[derive(Debug, Clone)]
pub enum DiscordBotEvent {
    Ready(Ready),
    GuildCreate {
        context: Context,
        guild: Guild,
    },
    Message {
        context: Context,
        message: Message,
    },
    Interaction {
        context: Context,
        interaction: Interaction,
    },
    Disconnected,
}

struct DiscordBotEvents {
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
}

impl DiscordBotEvents {
    fn forward(&self, event: DiscordBotEvent) {
        if let Err(error) = self.discord_events_tx.send(event) {
            warn!("Failed to process discord event: {}", error);
        }
    }
}

#[async_trait]
impl EventHandler for DiscordBotEvents {
    async fn ready(&self, _context: Context, ready: Ready) {
        self.forward(DiscordBotEvent::Ready(ready));
    }

    async fn guild_create(&self, context: Context, guild: Guild, _is_new: Option<bool>) {
        self.forward(DiscordBotEvent::GuildCreate { context, guild });
    }

    async fn message(&self, context: Context, message: Message) {
        self.forward(DiscordBotEvent::Message { context, message });
    }

    async fn interaction_create(&self, context: Context, interaction: Interaction) {
        self.forward(DiscordBotEvent::Interaction {
            context,
            interaction,
        });
    }
}

/// Channels the Discord task reads from.
pub struct DiscordChannels {
    /// Classified events from the Archipelago side.
    pub event_rx: mpsc::UnboundedReceiver<ClassifiedEvent>,
    /// Upstream connection state, mirrored as the bot activity.
    pub status_rx: watch::Receiver<ActivityStatus>,
    pub shutdown_rx: watch::Receiver<bool>,
}

pub struct DiscordBotBuilder {
    token: String,
    channels: DiscordChannels,
    handler: BridgeHandler,
}

impl DiscordBotBuilder {
    pub fn new(token: String, channels: DiscordChannels, handler: BridgeHandler) -> Self {
        Self {
            token,
            channels,
            handler,
        }
    }

    pub async fn build(self) -> Result<DiscordBot, DiscordError> {
        let (discord_events_tx, discord_events_rx) = mpsc::unbounded_channel::<DiscordBotEvent>();
        let client = build_client(&self.token, discord_events_tx.clone()).await?;

        Ok(DiscordBot {
            client: Some(client),
            token: self.token,
            handler: self.handler,
            discord_events_rx,
            discord_events_tx,
            channels: self.channels,
        })
    }
}

async fn build_client(
    token: &str,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
) -> Result<Client, DiscordError> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS;

    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    let events = DiscordBotEvents { discord_events_tx };
    let client = serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(events)
        .await?;
    Ok(client)
}

/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn discord_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(Duration::from_secs(300))
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

pub struct DiscordBot {
    client: Option<Client>,
    token: String,
    handler: BridgeHandler,
    discord_events_rx: mpsc::UnboundedReceiver<DiscordBotEvent>,
    discord_events_tx: mpsc::UnboundedSender<DiscordBotEvent>,
    channels: DiscordChannels,
}

impl DiscordBot {
    pub async fn run(mut self) {
        let shard_manager = self.client.as_ref().map(|c| c.shard_manager.clone());
        let mut shutdown_rx = self.channels.shutdown_rx.clone();

        tokio::select! {
            _ = Self::run_connection(&mut self.client, &self.token, &self.discord_events_tx) => {}
            _ = Self::process_events(&mut self.discord_events_rx, &mut self.handler, &mut self.channels) => {}
            _ = async {
                loop {
                    if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                if let Some(ref manager) = shard_manager {
                    info!("Initiating graceful Discord shutdown...");
                    manager.shutdown_all().await;
                    info!("Discord shutdown complete");
                }
            } => {}
        }
        info!("Discord task ended");
    }

    async fn run_connection(
        client: &mut Option<Client>,
        token: &str,
        discord_events_tx: &mpsc::UnboundedSender<DiscordBotEvent>,
    ) {
        let mut backoff = discord_backoff();

        loop {
            info!("Connecting to Discord...");

            let mut client = match client.take() {
                Some(client) => client,
                None => match build_client(token, discord_events_tx.clone()).await {
                    Ok(client) => {
                        backoff = discord_backoff();
                        client
                    }
                    Err(e) => {
                        error!("Failed to rebuild Discord client: {}", e);
                        let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                        warn!("Retrying in {:.1}s...", delay.as_secs_f64());
                        sleep(delay).await;
                        continue;
                    }
                },
            };

            let result = client.start().await;
            if let Err(error) = discord_events_tx.send(DiscordBotEvent::Disconnected) {
                warn!("Failed to process discord event: {}", error);
            }
            match result {
                Ok(()) => {
                    info!("Discord client disconnected normally");
                    break;
                }
                Err(e) => {
                    error!("Discord client error: {}", e);
                    let delay = backoff.next().unwrap_or(Duration::from_secs(300));
                    warn!(
                        "Discord disconnected. Reconnecting in {:.1}s...",
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn process_events(
        discord_events_rx: &mut mpsc::UnboundedReceiver<DiscordBotEvent>,
        handler: &mut BridgeHandler,
        channels: &mut DiscordChannels,
    ) {
        let mut discord_connection: Option<Context> = None;

        loop {
            tokio::select! {
                event = discord_events_rx.recv() => {
                    let Some(event) = event else {
                        debug!("Discord events channel closed.");
                        break;
                    };
                    match event {
                        DiscordBotEvent::Ready(ready) => {
                            info!("Discord bot connected as {}", ready.user.name);
                        }
                        DiscordBotEvent::GuildCreate { context, guild } => {
                            handler.handle_guild_create(&context, &guild).await;
                            let status = channels.status_rx.borrow().clone();
                            handler.handle_status_update(&context, &status);
                            discord_connection = Some(context);
                        }
                        DiscordBotEvent::Message { context, message } => {
                            handler.handle_message(&context, &message).await;
                        }
                        DiscordBotEvent::Interaction { context, interaction } => {
                            handler.handle_interaction(&context, interaction).await;
                        }
                        DiscordBotEvent::Disconnected => {
                            discord_connection = None;
                        }
                    }
                }

                // Archipelago -> Discord (drop if not connected)
                event = channels.event_rx.recv() => {
                    let Some(event) = event else {
                        warn!("Relay event channel closed");
                        break;
                    };
                    match discord_connection {
                        Some(ref context) => handler.handle_relay_event(context, &event).await,
                        None => debug!("Dropping '{}' - Discord not connected", event.title),
                    }
                }

                changed = channels.status_rx.changed() => {
                    if changed.is_err() {
                        warn!("Status channel closed");
                        break;
                    }
                    let status = channels.status_rx.borrow_and_update().clone();
                    if let Some(ref context) = discord_connection {
                        handler.handle_status_update(context, &status);
                    }
                }
            }
        }
    }
}

//! Discord event handling for the relay.
//!
//! Called from the single event loop in [`crate::discord::client`]: chat
//! relay, slash commands, wizard components and text replies, relay event
//! posting, and the activity line.

use std::sync::Arc;

use serenity::all::{
    ActivityData, ChannelType, Command, CommandInteraction, ComponentInteraction,
    ComponentInteractionDataKind, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateMessage, GuildId, Interaction, OnlineStatus,
};
use serenity::model::channel::Message;
use serenity::model::guild::Guild;
use serenity::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bridge::Relay;
use crate::common::messages::{ActivityStatus, ClassifiedEvent, DiscordMessage, OutgoingChat};
use crate::discord::commands::{self, describe_status, CommandHandler, CommandOutcome, SlashCommand};
use crate::discord::dispatch::{render_event, send_posts};
use crate::discord::resolver::{CacheLookup, MessageResolver};
use crate::discord::setup::{render_reply, WizardView};
use crate::setup::{SetupWizard, WizardInput, WizardReply};

pub struct BridgeHandler {
    relay: Arc<Relay>,
    resolver: MessageResolver,
    commands: CommandHandler,
    wizard: Arc<SetupWizard>,
    outgoing_tx: mpsc::UnboundedSender<OutgoingChat>,
    /// Guild for slash command registration; global when `None`.
    guild_id: Option<u64>,
    enable_commands: bool,
    commands_registered: bool,
}

impl BridgeHandler {
    pub fn new(
        relay: Arc<Relay>,
        resolver: MessageResolver,
        commands: CommandHandler,
        wizard: Arc<SetupWizard>,
        outgoing_tx: mpsc::UnboundedSender<OutgoingChat>,
        guild_id: Option<u64>,
        enable_commands: bool,
    ) -> Self {
        Self {
            relay,
            resolver,
            commands,
            wizard,
            outgoing_tx,
            guild_id,
            enable_commands,
            commands_registered: false,
        }
    }

    pub async fn handle_guild_create(&mut self, ctx: &Context, guild: &Guild) {
        info!(
            "Received guild data for '{}' ({} channels)",
            guild.name,
            guild.channels.len()
        );

        if !self.enable_commands || self.commands_registered {
            return;
        }

        let result = match self.guild_id {
            Some(id) if id == guild.id.get() => {
                GuildId::new(id)
                    .set_commands(&ctx.http, commands::definitions())
                    .await
            }
            Some(_) => return,
            None => Command::set_global_commands(&ctx.http, commands::definitions()).await,
        };

        match result {
            Ok(registered) => {
                info!("Registered {} slash commands", registered.len());
                self.commands_registered = true;
            }
            Err(e) => error!("Failed to register slash commands: {}", e),
        }
    }

    pub async fn handle_message(&self, ctx: &Context, message: &Message) {
        if message.author.bot || message.guild_id.is_none() {
            return;
        }
        if message.author.id == ctx.cache.current_user().id {
            return;
        }

        let user_id = message.author.id.get();
        let channel_id = message.channel_id.get();

        if self.wizard.awaits_text(user_id, channel_id) {
            let input = WizardInput::Text {
                channel_id,
                text: message.content.clone(),
            };
            let reply = self.wizard.handle(user_id, input).await;
            if reply != WizardReply::Ignored {
                // Replies may carry the room password
                if let Err(e) = message.delete(&ctx.http).await {
                    debug!("Could not delete wizard reply: {}", e);
                }
                let view = render_reply(&reply, &text_channels(ctx, message.guild_id));
                let builder = CreateMessage::new()
                    .content(view.content.clone())
                    .components(view.components());
                if let Err(e) = message.channel_id.send_message(&ctx.http, builder).await {
                    error!(channel = channel_id, "Failed to send wizard prompt: {}", e);
                }
                return;
            }
        }

        let urls: Vec<&str> = message.attachments.iter().map(|a| a.url.as_str()).collect();
        let content = with_attachments(&message.content, &urls);
        let flattened = self
            .resolver
            .flatten_for_archipelago(&content, &CacheLookup(ctx.cache.as_ref()));

        let discord_message = DiscordMessage {
            sender: display_name(message),
            content: flattened,
            channel_id,
        };
        if let Some(chat) = self.relay.handle_discord_message(&discord_message) {
            info!(channel = channel_id, "Discord -> Archipelago: {}", chat.text);
            if let Err(e) = self.outgoing_tx.send(chat) {
                error!("Failed to queue message for Archipelago: {}", e);
            }
        }
    }

    pub async fn handle_interaction(&self, ctx: &Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.handle_command(ctx, &command).await,
            Interaction::Component(component) => self.handle_component(ctx, &component).await,
            _ => {}
        }
    }

    async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(parsed) = SlashCommand::from_interaction(command) else {
            warn!("Unknown slash command '{}'", command.data.name);
            return;
        };
        let user_id = command.user.id.get();

        let message = match self.commands.execute(user_id, parsed).await {
            Ok(CommandOutcome::Reply(text)) => CreateInteractionResponseMessage::new().content(text),
            Ok(CommandOutcome::StartSetup) => {
                let reply = self.wizard.start(user_id, command.channel_id.get());
                view_message(&render_reply(&reply, &text_channels(ctx, command.guild_id)))
            }
            Err(e) => {
                error!(user_id, "Slash command '{}' failed: {:#}", command.data.name, e);
                CreateInteractionResponseMessage::new().content("Something went wrong, try again later.")
            }
        };

        let response = CreateInteractionResponse::Message(message.ephemeral(true));
        if let Err(e) = command.create_response(&ctx.http, response).await {
            error!("Failed to respond to /{}: {}", command.data.name, e);
        }
    }

    async fn handle_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let values = match &component.data.kind {
            ComponentInteractionDataKind::StringSelect { values } => values.clone(),
            _ => Vec::new(),
        };
        let Some(input) = WizardInput::from_component(&component.data.custom_id, &values) else {
            debug!("Ignoring component '{}'", component.data.custom_id);
            return;
        };

        let reply = self.wizard.handle(component.user.id.get(), input).await;
        let message = view_message(&render_reply(&reply, &text_channels(ctx, component.guild_id)));

        // Expiry goes to the clicking user only; the wizard message may belong to someone else
        let response = if reply == WizardReply::Expired {
            CreateInteractionResponse::Message(message.ephemeral(true))
        } else {
            CreateInteractionResponse::UpdateMessage(message)
        };
        if let Err(e) = component.create_response(&ctx.http, response).await {
            error!("Failed to respond to setup component: {}", e);
        }
    }

    pub async fn handle_relay_event(&self, ctx: &Context, event: &ClassifiedEvent) {
        let posts = render_event(event, self.relay.channels(), &self.resolver);
        send_posts(&ctx.http, posts).await;
    }

    pub fn handle_status_update(&self, ctx: &Context, status: &ActivityStatus) {
        let (text, online) = presence_for(status);
        ctx.set_presence(Some(ActivityData::custom(text)), online);
    }
}

fn view_message(view: &WizardView) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .content(view.content.clone())
        .components(view.components())
}

/// Text channels of `guild_id` in sidebar order, as `(id, name)`.
fn text_channels(ctx: &Context, guild_id: Option<GuildId>) -> Vec<(u64, String)> {
    let Some(guild_id) = guild_id else {
        return Vec::new();
    };
    let mut channels: Vec<(u16, u64, String)> = match ctx.cache.guild(guild_id) {
        Some(guild) => guild
            .channels
            .values()
            .filter(|c| c.kind == ChannelType::Text)
            .map(|c| (c.position, c.id.get(), c.name.clone()))
            .collect(),
        None => return Vec::new(),
    };
    channels.sort();
    channels.into_iter().map(|(_, id, name)| (id, name)).collect()
}

fn display_name(message: &Message) -> String {
    message
        .member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .or_else(|| message.author.global_name.clone())
        .unwrap_or_else(|| message.author.name.clone())
}

fn with_attachments(content: &str, urls: &[&str]) -> String {
    let mut full = content.trim().to_string();
    for url in urls {
        if !full.is_empty() {
            full.push(' ');
        }
        full.push_str(url);
    }
    full
}

fn presence_for(status: &ActivityStatus) -> (String, OnlineStatus) {
    let online = match status {
        ActivityStatus::Connected { .. } => OnlineStatus::Online,
        ActivityStatus::Connecting | ActivityStatus::Retrying { .. } => OnlineStatus::Idle,
        ActivityStatus::GivenUp => OnlineStatus::DoNotDisturb,
    };
    (describe_status(status), online)
}

//! The relay pipeline between the Archipelago server and Discord.
//!
//! Inbound: dedup -> classify -> filter -> mentions.
//! Outbound: chat channel check -> filter -> format.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::common::messages::{ClassifiedEvent, DiscordMessage, OutgoingChat};
use crate::config::types::RelayConfig;
use crate::discord::mentions::MentionResolver;
use crate::game::formatter::{FormatContext, MessageFormatter};

use super::classifier::{classify, InboundMessage};
use super::dedup::Deduplicator;
use super::filter::{FilterDirection, MessageFilter};
use super::state::ChannelMap;

pub struct Relay {
    dedup: Mutex<Deduplicator>,
    mentions: MentionResolver,
    filter: MessageFilter,
    formatter: MessageFormatter,
    channels: ChannelMap,
}

impl Relay {
    pub fn new(
        dedup: Deduplicator,
        mentions: MentionResolver,
        filter: MessageFilter,
        formatter: MessageFormatter,
        channels: ChannelMap,
    ) -> Self {
        Self {
            dedup: Mutex::new(dedup),
            mentions,
            filter,
            formatter,
            channels,
        }
    }

    pub fn from_config(config: &RelayConfig, mentions: MentionResolver, channels: ChannelMap) -> Self {
        let filter = MessageFilter::from_config(config.filters.as_ref());
        if filter.has_patterns() {
            info!("Message filters enabled");
        }
        Self::new(
            Deduplicator::new(config.dedup_capacity),
            mentions,
            filter,
            MessageFormatter::new(config.discord_format.clone()),
            channels,
        )
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// Turn one inbound message into an event for Discord.
    ///
    /// Returns `None` for duplicates, malformed typed packets and filtered text.
    pub async fn process(&self, msg: InboundMessage) -> Option<ClassifiedEvent> {
        {
            let mut dedup = self.dedup.lock().unwrap_or_else(|e| e.into_inner());
            if dedup.is_duplicate(msg.text()) {
                debug!("Skipping duplicate message: {}", msg.text());
                return None;
            }
        }

        let mut event = match classify(&msg) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping unclassifiable message: {}", e);
                return None;
            }
        };

        if self.filter.should_filter(FilterDirection::ToDiscord, msg.text()) {
            debug!("Message filtered before Discord: {}", msg.text());
            return None;
        }

        event.mentions = self.mentions.resolve_mentions(msg.text()).await;
        debug!(
            categories = ?event.categories,
            mentions = event.mentions.len(),
            "Classified '{}'",
            event.title
        );
        Some(event)
    }

    /// Prepare a Discord message for the Archipelago server.
    ///
    /// Only the mapped chat channel is relayed; empty and filtered messages are dropped.
    pub fn handle_discord_message(&self, msg: &DiscordMessage) -> Option<OutgoingChat> {
        if !self.channels.is_chat_channel(msg.channel_id) {
            return None;
        }

        let content = msg.content.trim();
        if content.is_empty() {
            return None;
        }

        if self.filter.should_filter(FilterDirection::ToArchipelago, content) {
            debug!(sender = %msg.sender, "Message filtered before Archipelago");
            return None;
        }

        let text = self
            .formatter
            .format(&FormatContext::new(msg.sender.as_str(), content));
        Some(OutgoingChat {
            sender: msg.sender.clone(),
            text,
        })
    }
}

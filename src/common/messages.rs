//! Canonical message types for bridge communication.
//!
//! This module defines the single source of truth for message types
//! used in communication between Discord and the Archipelago server.

use std::fmt;
use std::time::Duration;

/// One of the four fixed downstream destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelCategory {
    Chat,
    Trade,
    Hint,
    Log,
}

impl ChannelCategory {
    pub const ALL: [ChannelCategory; 4] = [
        ChannelCategory::Chat,
        ChannelCategory::Trade,
        ChannelCategory::Hint,
        ChannelCategory::Log,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Trade => "trade",
            Self::Hint => "hint",
            Self::Log => "log",
        }
    }

    /// Embed colour used when posting to this category.
    pub fn color(&self) -> u32 {
        match self {
            Self::Chat => 0x3498db,
            Self::Trade => 0xe67e22,
            Self::Hint => 0x9b59b6,
            Self::Log => 0x95a5a6,
        }
    }
}

impl fmt::Display for ChannelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Discord user to ping alongside an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mention {
    pub discord_id: u64,
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@{}>", self.discord_id)
    }
}

/// Result of classifying one inbound packet, ready for the channel sender.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEvent {
    /// Destinations, in posting order. Never empty.
    pub categories: Vec<ChannelCategory>,
    pub title: String,
    pub body: String,
    pub color: u32,
    pub mentions: Vec<Mention>,
}

/// Chat line typed in Discord, headed for the Archipelago server.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingChat {
    /// Sender's Discord display name.
    pub sender: String,
    /// Fully formatted text for the `Say` packet.
    pub text: String,
}

/// Message from Discord before filtering and formatting.
#[derive(Debug, Clone)]
pub struct DiscordMessage {
    /// Sender's Discord display name.
    pub sender: String,
    /// Message content.
    pub content: String,
    /// Discord channel ID.
    pub channel_id: u64,
}

/// Control requests for the upstream connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamCommand {
    /// Drop any pending retry and connect right away.
    Reconnect,
}

/// Represents a change in the upstream connection state, shown as bot activity.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityStatus {
    /// Opening the transport and waiting for `Connected`.
    Connecting,
    /// Slot is connected to the server.
    Connected { slot: String, server: String },
    /// Waiting before the next attempt.
    Retrying { attempt: u32, delay: Duration },
    /// Max attempts reached; waiting for `/reconnect`.
    GivenUp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_renders_as_user_ping() {
        let mention = Mention { discord_id: 1234 };
        assert_eq!(mention.to_string(), "<@1234>");
    }

    #[test]
    fn test_category_names() {
        let names: Vec<&str> = ChannelCategory::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["chat", "trade", "hint", "log"]);
    }
}

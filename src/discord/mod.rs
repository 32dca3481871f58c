//! Discord side of the relay.
//!
//! Posts classified events to their category channels, relays the chat
//! channel upstream, and serves the slash commands and setup wizard.

pub mod client;
pub mod commands;
pub mod dispatch;
pub mod handler;
pub mod mentions;
pub mod resolver;
pub mod setup;

pub use client::{DiscordBotBuilder, DiscordChannels};
pub use commands::CommandHandler;
pub use handler::BridgeHandler;
pub use mentions::MentionResolver;
pub use resolver::MessageResolver;

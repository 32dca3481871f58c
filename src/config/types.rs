//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::common::messages::ChannelCategory;
use crate::common::reconnect::ReconnectConfig;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    pub archipelago: ArchipelagoConfig,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    /// Guild for slash command registration (global commands when absent).
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default = "default_true")]
    pub enable_commands: bool,
}

/// Discord channel IDs per category.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ChannelsConfig {
    pub chat: Option<u64>,
    pub trade: Option<u64>,
    pub hint: Option<u64>,
    pub log: Option<u64>,
}

impl ChannelsConfig {
    pub fn get(&self, category: ChannelCategory) -> Option<u64> {
        match category {
            ChannelCategory::Chat => self.chat,
            ChannelCategory::Trade => self.trade,
            ChannelCategory::Hint => self.hint,
            ChannelCategory::Log => self.log,
        }
    }

    pub fn set(&mut self, category: ChannelCategory, channel_id: Option<u64>) {
        match category {
            ChannelCategory::Chat => self.chat = channel_id,
            ChannelCategory::Trade => self.trade = channel_id,
            ChannelCategory::Hint => self.hint = channel_id,
            ChannelCategory::Log => self.log = channel_id,
        }
    }
}

/// Archipelago server connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ArchipelagoConfig {
    /// `host:port`, optionally with a `ws://` or `wss://` scheme.
    pub server: String,
    /// Slot name to connect as.
    pub slot: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
}

/// Reconnection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectSettings {
    pub fn to_reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            base_delay: std::time::Duration::from_millis(self.base_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

/// Relay behaviour settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Format for Discord -> Archipelago chat (`%user`, `%message`).
    #[serde(default = "default_discord_format")]
    pub discord_format: String,
    pub filters: Option<FiltersConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: default_dedup_capacity(),
            session_ttl_secs: default_session_ttl_secs(),
            discord_format: default_discord_format(),
            filters: None,
        }
    }
}

/// Message filtering configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Patterns applied in both directions.
    pub patterns: Option<Vec<String>>,
    /// Patterns for Archipelago -> Discord only.
    pub to_discord: Option<Vec<String>>,
    /// Patterns for Discord -> Archipelago only.
    pub to_archipelago: Option<Vec<String>>,
}

impl FiltersConfig {
    /// Shared patterns followed by the direction-specific ones.
    pub fn to_discord_patterns(&self) -> Vec<String> {
        merged(&self.patterns, &self.to_discord)
    }

    pub fn to_archipelago_patterns(&self) -> Vec<String> {
        merged(&self.patterns, &self.to_archipelago)
    }
}

fn merged(shared: &Option<Vec<String>>, direction: &Option<Vec<String>>) -> Vec<String> {
    shared
        .iter()
        .chain(direction.iter())
        .flatten()
        .cloned()
        .collect()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tags() -> Vec<String> {
    vec!["TextOnly".to_string()]
}

fn default_base_delay_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_dedup_capacity() -> usize {
    50
}

fn default_session_ttl_secs() -> u64 {
    900
}

fn default_discord_format() -> String {
    "%user: %message".to_string()
}

fn default_storage_path() -> String {
    "archibridge.db".to_string()
}

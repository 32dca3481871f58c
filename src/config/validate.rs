//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Validate Discord config
    if config.discord.token.is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }
    for (name, id) in [
        ("chat", config.discord.channels.chat),
        ("trade", config.discord.channels.trade),
        ("hint", config.discord.channels.hint),
        ("log", config.discord.channels.log),
    ] {
        if id == Some(0) {
            errors.push(format!("discord.channels.{} must be non-zero", name));
        }
    }

    // Validate Archipelago config
    if config.archipelago.server.trim().is_empty() {
        errors.push("archipelago.server is required".to_string());
    }
    if config.archipelago.slot.trim().is_empty() {
        errors.push("archipelago.slot is required".to_string());
    }
    if config.archipelago.slot.chars().count() > 16 {
        errors.push(format!(
            "archipelago.slot must be at most 16 characters (got {})",
            config.archipelago.slot.chars().count()
        ));
    }

    // Validate reconnect config
    if config.reconnect.base_delay_ms == 0 {
        errors.push("reconnect.base_delay_ms must be non-zero".to_string());
    }

    // Validate relay config
    if config.relay.dedup_capacity == 0 {
        errors.push("relay.dedup_capacity must be non-zero".to_string());
    }
    if !config.relay.discord_format.contains("%message") {
        errors.push("relay.discord_format must contain %message".to_string());
    }

    // Validate filter patterns (try to compile them)
    if let Some(ref filters) = config.relay.filters {
        for (key, patterns) in [
            ("patterns", &filters.patterns),
            ("to_discord", &filters.to_discord),
            ("to_archipelago", &filters.to_archipelago),
        ] {
            for (i, pattern) in patterns.iter().flatten().enumerate() {
                if Regex::new(pattern).is_err() {
                    errors.push(format!(
                        "relay.filters.{}[{}] is not a valid regex: '{}'",
                        key, i, pattern
                    ));
                }
            }
        }
    }

    if config.storage.path.is_empty() {
        errors.push("storage.path is required".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

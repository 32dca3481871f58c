//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `ARCHIBRIDGE_DISCORD_TOKEN` - Discord bot token
//! - `ARCHIBRIDGE_DISCORD_GUILD_ID` - Guild for slash command registration
//! - `ARCHIBRIDGE_AP_SERVER` - Archipelago server address
//! - `ARCHIBRIDGE_AP_SLOT` - Slot name
//! - `ARCHIBRIDGE_AP_PASSWORD` - Room password
//! - `ARCHIBRIDGE_DB_PATH` - SQLite database path

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "ARCHIBRIDGE";

/// Apply environment variable overrides to a config.
///
/// This allows sensitive values like tokens and passwords to be
/// provided via environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }
    if let Ok(guild_id) = env::var(format!("{}_DISCORD_GUILD_ID", ENV_PREFIX)) {
        if let Ok(id) = guild_id.parse() {
            config.discord.guild_id = Some(id);
        }
    }

    if let Ok(server) = env::var(format!("{}_AP_SERVER", ENV_PREFIX)) {
        config.archipelago.server = server;
    }
    if let Ok(slot) = env::var(format!("{}_AP_SLOT", ENV_PREFIX)) {
        config.archipelago.slot = slot;
    }
    if let Ok(password) = env::var(format!("{}_AP_PASSWORD", ENV_PREFIX)) {
        config.archipelago.password = password;
    }

    if let Ok(path) = env::var(format!("{}_DB_PATH", ENV_PREFIX)) {
        config.storage.path = path;
    }

    config
}

/// Check if any required environment variables are set but empty.
///
/// Returns a list of variable names that are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [
        format!("{}_DISCORD_TOKEN", ENV_PREFIX),
        format!("{}_AP_SERVER", ENV_PREFIX),
        format!("{}_AP_SLOT", ENV_PREFIX),
    ];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `ARCHIBRIDGE_CONFIG` environment variable, otherwise returns "archibridge.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "archibridge.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "original_token".to_string(),
                guild_id: None,
                channels: ChannelsConfig::default(),
                enable_commands: true,
            },
            archipelago: ArchipelagoConfig {
                server: "localhost:38281".to_string(),
                slot: "Relay".to_string(),
                password: String::new(),
                tags: vec!["TextOnly".to_string()],
            },
            reconnect: ReconnectSettings::default(),
            relay: RelayConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "ARCHIBRIDGE");
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("ARCHIBRIDGE_CONFIG");
        assert_eq!(get_config_path(), "archibridge.conf");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("ARCHIBRIDGE_DISCORD_TOKEN");
        env::remove_var("ARCHIBRIDGE_AP_SLOT");

        let config = make_test_config();
        let result = apply_env_overrides(config);

        assert_eq!(result.discord.token, "original_token");
        assert_eq!(result.archipelago.slot, "Relay");
    }
}

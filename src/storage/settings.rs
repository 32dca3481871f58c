//! Relay settings persisted by the setup wizard.
//!
//! Settings saved here take precedence over the config file on startup.

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::common::error::{StorageError, StorageResult};
use crate::config::types::{ArchipelagoConfig, ChannelsConfig, Config};
use crate::storage::database::Database;

const SETTINGS_KEY: &str = "relay";

/// Channel map and upstream connection chosen through `/setup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySettings {
    pub channels: ChannelsConfig,
    pub archipelago: ArchipelagoConfig,
}

impl RelaySettings {
    /// Override the file-configured channels and connection target.
    pub fn apply_to(self, config: &mut Config) {
        config.discord.channels = self.channels;
        config.archipelago = self.archipelago;
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_settings(&self) -> StorageResult<Option<RelaySettings>>;
    async fn save_settings(&self, settings: &RelaySettings) -> StorageResult<()>;
}

#[async_trait]
impl SettingsStore for Database {
    async fn load_settings(&self) -> StorageResult<Option<RelaySettings>> {
        let value = self
            .conn()
            .call(|conn| -> rusqlite::Result<Option<String>> {
                conn.query_row(
                    "SELECT value FROM relay_settings WHERE key = ?1",
                    rusqlite::params![SETTINGS_KEY],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;

        value
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| StorageError::InvalidValue {
                    key: SETTINGS_KEY.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    async fn save_settings(&self, settings: &RelaySettings) -> StorageResult<()> {
        let raw = serde_json::to_string(settings).map_err(|e| StorageError::InvalidValue {
            key: SETTINGS_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.conn()
            .call(move |conn| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT OR REPLACE INTO relay_settings (key, value) VALUES (?1, ?2)",
                    rusqlite::params![SETTINGS_KEY, raw],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

//! Links between Discord users and Archipelago slot names.
//!
//! A slot belongs to at most one Discord user, a user may own many slots.
//! Slot names compare case-insensitively.

use async_trait::async_trait;
use rusqlite::OptionalExtension;

use crate::common::error::{StorageError, StorageResult};
use crate::storage::database::Database;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLink {
    pub discord_id: u64,
    pub slot_name: String,
}

/// Lookup and mutation of user links.
#[async_trait]
pub trait UserLinkStore: Send + Sync {
    /// Find the link owning `slot_name`, if any.
    async fn find_by_slot(&self, slot_name: &str) -> StorageResult<Option<UserLink>>;

    /// Link `slot_name` to `discord_id`, replacing any previous owner.
    async fn link(&self, discord_id: u64, slot_name: &str) -> StorageResult<()>;

    /// Remove the link if `discord_id` owns `slot_name`. Returns whether a row was removed.
    async fn unlink(&self, discord_id: u64, slot_name: &str) -> StorageResult<bool>;

    /// All slots linked to `discord_id`, ordered by slot name.
    async fn links_for_user(&self, discord_id: u64) -> StorageResult<Vec<UserLink>>;
}

fn parse_discord_id(raw: String) -> StorageResult<u64> {
    raw.parse().map_err(|_| StorageError::InvalidValue {
        key: "user_links.discord_id".to_string(),
        message: format!("'{}' is not a Discord id", raw),
    })
}

#[async_trait]
impl UserLinkStore for Database {
    async fn find_by_slot(&self, slot_name: &str) -> StorageResult<Option<UserLink>> {
        let slot = slot_name.to_string();
        let row = self
            .conn()
            .call(move |conn| -> rusqlite::Result<Option<(String, String)>> {
                conn.query_row(
                    "SELECT discord_id, slot_name FROM user_links WHERE slot_name = ?1",
                    rusqlite::params![slot],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
            })
            .await?;

        match row {
            Some((discord_id, slot_name)) => Ok(Some(UserLink {
                discord_id: parse_discord_id(discord_id)?,
                slot_name,
            })),
            None => Ok(None),
        }
    }

    async fn link(&self, discord_id: u64, slot_name: &str) -> StorageResult<()> {
        let slot = slot_name.to_string();
        self.conn()
            .call(move |conn| -> rusqlite::Result<()> {
                conn.execute(
                    "INSERT INTO user_links (slot_name, discord_id) VALUES (?1, ?2) \
                     ON CONFLICT(slot_name) DO UPDATE SET \
                     discord_id = excluded.discord_id, slot_name = excluded.slot_name",
                    rusqlite::params![slot, discord_id.to_string()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn unlink(&self, discord_id: u64, slot_name: &str) -> StorageResult<bool> {
        let slot = slot_name.to_string();
        let removed = self
            .conn()
            .call(move |conn| -> rusqlite::Result<usize> {
                conn.execute(
                    "DELETE FROM user_links WHERE slot_name = ?1 AND discord_id = ?2",
                    rusqlite::params![slot, discord_id.to_string()],
                )
            })
            .await?;
        Ok(removed > 0)
    }

    async fn links_for_user(&self, discord_id: u64) -> StorageResult<Vec<UserLink>> {
        let slots = self
            .conn()
            .call(move |conn| -> rusqlite::Result<Vec<String>> {
                let mut stmt = conn.prepare(
                    "SELECT slot_name FROM user_links WHERE discord_id = ?1 \
                     ORDER BY slot_name COLLATE NOCASE",
                )?;
                let rows = stmt.query_map(rusqlite::params![discord_id.to_string()], |row| {
                    row.get::<_, String>(0)
                })?;
                let slots = rows.collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(slots)
            })
            .await?;

        Ok(slots
            .into_iter()
            .map(|slot_name| UserLink {
                discord_id,
                slot_name,
            })
            .collect())
    }
}

//! SQLite connection handle.

use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::info;

use crate::common::error::{StorageError, StorageResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_links (
    slot_name TEXT NOT NULL COLLATE NOCASE PRIMARY KEY,
    discord_id TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_user_links_discord_id ON user_links (discord_id);
CREATE TABLE IF NOT EXISTS relay_settings (
    key TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Shared handle to the relay database.
///
/// Cheap to clone; every clone talks to the same background connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path` and apply the schema.
    pub async fn open(path: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| StorageError::Open {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        let db = Self {
            conn: Arc::new(conn),
        };
        db.migrate().await?;
        info!("Opened database at {}", path);
        Ok(db)
    }

    /// Open a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StorageError::Open {
                path: ":memory:".to_string(),
                message: e.to_string(),
            })?;
        let db = Self {
            conn: Arc::new(conn),
        };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> StorageResult<()> {
        self.conn
            .call(|conn| -> rusqlite::Result<()> { conn.execute_batch(SCHEMA) })
            .await?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

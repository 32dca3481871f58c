//! SQLite persistence for Discord user links and relay settings.
//!
//! - `database`: connection handle and schema
//! - `links`: Discord user to Archipelago slot links
//! - `settings`: relay settings saved by the setup wizard

pub mod database;
pub mod links;
pub mod settings;

pub use database::Database;
pub use links::{UserLink, UserLinkStore};
pub use settings::{RelaySettings, SettingsStore};

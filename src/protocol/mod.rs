//! Archipelago network protocol.
//!
//! - `packets`: server and client packets, frame codec
//! - `text`: `PrintJSON` rendering with roster and data package lookups
//! - `transport`: WebSocket transport and connector

pub mod packets;
pub mod text;
pub mod transport;

pub use text::TextRenderer;
pub use transport::{Connector, Transport, WsConnector};

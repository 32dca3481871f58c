//! Packets sent to the Archipelago server.

use serde::Serialize;

use super::server::NetworkVersion;

/// Protocol version this client announces.
pub const CLIENT_VERSION: (u32, u32, u32) = (0, 5, 1);

/// Client packet, serialized with a `cmd` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd")]
pub enum ClientPacket {
    Connect(Connect),
    Say {
        text: String,
    },
    GetDataPackage {
        #[serde(skip_serializing_if = "Option::is_none")]
        games: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connect {
    pub password: String,
    /// Empty for text-only clients.
    pub game: String,
    pub name: String,
    pub uuid: String,
    pub version: NetworkVersion,
    /// Bit flags for which items the server should send; zero for none.
    pub items_handling: u8,
    pub tags: Vec<String>,
    pub slot_data: bool,
}

impl ClientPacket {
    /// `Connect` for a text-only relay client.
    pub fn connect(name: &str, password: &str, tags: &[String], uuid: &str) -> Self {
        let (major, minor, build) = CLIENT_VERSION;
        Self::Connect(Connect {
            password: password.to_string(),
            game: String::new(),
            name: name.to_string(),
            uuid: uuid.to_string(),
            version: NetworkVersion::new(major, minor, build),
            items_handling: 0,
            tags: tags.to_vec(),
            slot_data: false,
        })
    }

    pub fn say(text: impl Into<String>) -> Self {
        Self::Say { text: text.into() }
    }
}

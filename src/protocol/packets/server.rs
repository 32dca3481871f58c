//! Packets sent by the Archipelago server.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server packet, discriminated by its `cmd` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd")]
pub enum ServerPacket {
    RoomInfo(RoomInfo),
    Connected(Connected),
    ConnectionRefused(ConnectionRefused),
    DataPackage(DataPackage),
    #[serde(rename = "PrintJSON")]
    PrintJson(PrintJson),
    Print(Print),
    ReceivedItems(ReceivedItems),
    RoomUpdate(RoomUpdate),
    Bounced(Bounced),
    #[serde(other)]
    Unknown,
}

impl ServerPacket {
    pub fn cmd(&self) -> &'static str {
        match self {
            Self::RoomInfo(_) => "RoomInfo",
            Self::Connected(_) => "Connected",
            Self::ConnectionRefused(_) => "ConnectionRefused",
            Self::DataPackage(_) => "DataPackage",
            Self::PrintJson(_) => "PrintJSON",
            Self::Print(_) => "Print",
            Self::ReceivedItems(_) => "ReceivedItems",
            Self::RoomUpdate(_) => "RoomUpdate",
            Self::Bounced(_) => "Bounced",
            Self::Unknown => "Unknown",
        }
    }
}

/// Protocol version triple, serialized with its `class` marker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    #[serde(rename = "class", default = "version_class")]
    pub class: String,
}

impl NetworkVersion {
    pub fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build,
            class: version_class(),
        }
    }
}

fn version_class() -> String {
    "Version".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomInfo {
    pub version: Option<NetworkVersion>,
    #[serde(default)]
    pub seed_name: String,
    #[serde(default)]
    pub games: Vec<String>,
    #[serde(default)]
    pub password: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkPlayer {
    pub team: i64,
    pub slot: i64,
    pub alias: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSlot {
    pub name: String,
    pub game: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connected {
    pub team: i64,
    pub slot: i64,
    #[serde(default)]
    pub players: Vec<NetworkPlayer>,
    /// Keyed by slot number rendered as a string.
    #[serde(default)]
    pub slot_info: HashMap<String, NetworkSlot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionRefused {
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameData {
    #[serde(default)]
    pub item_name_to_id: HashMap<String, i64>,
    #[serde(default)]
    pub location_name_to_id: HashMap<String, i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPackageContents {
    #[serde(default)]
    pub games: HashMap<String, GameData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPackage {
    pub data: DataPackageContents,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkItem {
    pub item: i64,
    pub location: i64,
    pub player: i64,
    #[serde(default)]
    pub flags: i64,
}

/// One segment of a `PrintJSON` message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonMessagePart {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Owning slot for `item_id` and `location_id` parts.
    pub player: Option<i64>,
    pub flags: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrintJson {
    #[serde(default)]
    pub data: Vec<JsonMessagePart>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub receiving: Option<i64>,
    pub item: Option<NetworkItem>,
    pub found: Option<bool>,
    pub team: Option<i64>,
    pub slot: Option<i64>,
    pub message: Option<String>,
    pub tags: Option<Vec<String>>,
    pub countdown: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Print {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceivedItems {
    pub index: i64,
    #[serde(default)]
    pub items: Vec<NetworkItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomUpdate {
    pub players: Option<Vec<NetworkPlayer>>,
    pub slot_info: Option<HashMap<String, NetworkSlot>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bounced {
    #[serde(default)]
    pub tags: Vec<String>,
    pub data: Option<Value>,
}

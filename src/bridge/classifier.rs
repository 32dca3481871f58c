//! Packet classification.
//!
//! Maps an inbound Archipelago message onto one or more downstream channel
//! categories. Plain print text goes through an ordered rule list where the
//! first match wins; typed packets use a direct kind table.

use crate::common::error::{ProtocolError, ProtocolResult};
use crate::common::messages::{ChannelCategory, ClassifiedEvent};

use crate::common::messages::ChannelCategory::{Chat, Hint, Log, Trade};

/// Title used when no print rule matches.
pub const DEFAULT_TITLE: &str = "Archipelago Message";

/// One unit received from the server, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Unstructured server announcement.
    Print { text: String },
    /// Structured packet with a known kind.
    Typed(TypedPacket),
}

impl InboundMessage {
    pub fn print(text: impl Into<String>) -> Self {
        Self::Print { text: text.into() }
    }

    /// Text used for deduplication and as the default embed body.
    pub fn text(&self) -> &str {
        match self {
            Self::Print { text } => text,
            Self::Typed(packet) => &packet.payload.text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Join,
    Leave,
    Chat,
    Trade,
    Hint,
    ItemSent,
    ItemHinted,
    Collected,
    Released,
    Goaled,
    TagsUpdated,
    Admin,
    Tutorial,
    UserCommand,
    ServerChat,
    Message,
}

impl PacketKind {
    /// Map a `PrintJSON.type` value. Unknown types fall back to `Message`.
    pub fn from_print_type(value: &str) -> Self {
        match value {
            "Join" => Self::Join,
            "Part" => Self::Leave,
            "Chat" => Self::Chat,
            "Trade" => Self::Trade,
            "Hint" => Self::Hint,
            "ItemSend" | "ItemCheat" => Self::ItemSent,
            "ItemHinted" => Self::ItemHinted,
            "Collect" => Self::Collected,
            "Release" => Self::Released,
            "Goal" => Self::Goaled,
            "TagsChanged" => Self::TagsUpdated,
            "AdminCommandResult" => Self::Admin,
            "Tutorial" => Self::Tutorial,
            "CommandResult" => Self::UserCommand,
            "ServerChat" => Self::ServerChat,
            _ => Self::Message,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Join => "Join",
            Self::Leave => "Leave",
            Self::Chat => "Chat",
            Self::Trade => "Trade",
            Self::Hint => "Hint",
            Self::ItemSent => "ItemSent",
            Self::ItemHinted => "ItemHinted",
            Self::Collected => "Collected",
            Self::Released => "Released",
            Self::Goaled => "Goaled",
            Self::TagsUpdated => "TagsUpdated",
            Self::Admin => "Admin",
            Self::Tutorial => "Tutorial",
            Self::UserCommand => "UserCommand",
            Self::ServerChat => "ServerChat",
            Self::Message => "Message",
        }
    }
}

/// Fields carried by a typed packet. Which ones are required depends on the kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketPayload {
    /// Fully rendered server text.
    pub text: String,
    /// Slot the event is about (join, leave, goal, ...).
    pub player: Option<String>,
    /// Sending slot for chat and item packets.
    pub sender: Option<String>,
    /// Receiving slot for item and hint packets.
    pub receiver: Option<String>,
    pub item: Option<String>,
    pub location: Option<String>,
    /// Chat message without the sender prefix.
    pub message: Option<String>,
    pub tags: Vec<String>,
    /// Hint-found flag.
    pub found: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedPacket {
    pub kind: PacketKind,
    pub payload: PacketPayload,
}

impl TypedPacket {
    pub fn new(kind: PacketKind, payload: PacketPayload) -> Self {
        Self { kind, payload }
    }

    /// Check that the fields this kind needs are present.
    pub fn validate(&self) -> ProtocolResult<()> {
        let p = &self.payload;
        let required: Vec<(&'static str, bool)> = match self.kind {
            PacketKind::Join
            | PacketKind::Leave
            | PacketKind::Goaled
            | PacketKind::Collected
            | PacketKind::Released
            | PacketKind::TagsUpdated => vec![("player", p.player.is_some())],
            PacketKind::Chat => vec![
                ("sender", p.sender.is_some()),
                ("message", p.message.is_some()),
            ],
            PacketKind::Trade | PacketKind::ItemSent => vec![
                ("sender", p.sender.is_some()),
                ("receiver", p.receiver.is_some()),
                ("item", p.item.is_some()),
            ],
            PacketKind::Hint | PacketKind::ItemHinted => vec![
                ("receiver", p.receiver.is_some()),
                ("item", p.item.is_some()),
            ],
            PacketKind::Admin
            | PacketKind::Tutorial
            | PacketKind::UserCommand
            | PacketKind::ServerChat
            | PacketKind::Message => Vec::new(),
        };

        match required.iter().find(|(_, present)| !present) {
            Some((field, _)) => Err(ProtocolError::MissingField {
                cmd: self.kind.name().to_string(),
                field: *field,
            }),
            None => Ok(()),
        }
    }
}

/// One entry of the print rule list.
pub struct PrintRule {
    pub name: &'static str,
    /// Receives the original text and its lowercase form.
    matches: fn(&str, &str) -> bool,
    pub categories: &'static [ChannelCategory],
    pub title: &'static str,
}

const HINT_KEYWORDS: [&str; 5] = ["hint", "hints", "hint points", "each hint", "no hints"];
const ITEM_KEYWORDS: [&str; 3] = [" found ", " sent ", " received "];
const ITEM_PREFIXES: [&str; 2] = ["received ", "you got"];

fn is_join(text: &str, _lower: &str) -> bool {
    text.contains("has joined the game")
}

fn is_leave(text: &str, _lower: &str) -> bool {
    text.contains("has left the game")
}

fn is_trade(_text: &str, lower: &str) -> bool {
    lower.contains("trade")
}

fn is_hint(_text: &str, lower: &str) -> bool {
    HINT_KEYWORDS
        .iter()
        .any(|k| lower.starts_with(k) || lower.contains(k))
}

fn is_item(_text: &str, lower: &str) -> bool {
    ITEM_KEYWORDS.iter().any(|k| lower.contains(k))
        || ITEM_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Print rules in evaluation order. Order matters: rules overlap.
pub const PRINT_RULES: &[PrintRule] = &[
    PrintRule {
        name: "join",
        matches: is_join,
        categories: &[Chat, Log],
        title: "Join Event",
    },
    PrintRule {
        name: "leave",
        matches: is_leave,
        categories: &[Chat, Log],
        title: "Leave Event",
    },
    PrintRule {
        name: "trade",
        matches: is_trade,
        categories: &[Trade],
        title: "Trade Event",
    },
    PrintRule {
        name: "hint",
        matches: is_hint,
        categories: &[Hint],
        title: "Hint Event",
    },
    PrintRule {
        name: "item",
        matches: is_item,
        categories: &[Log],
        title: "Item Received",
    },
];

/// Find the first print rule matching `text`, if any.
pub fn match_print_rule(text: &str) -> Option<&'static PrintRule> {
    let lower = text.to_lowercase();
    PRINT_RULES.iter().find(|rule| (rule.matches)(text, &lower))
}

fn event(categories: &[ChannelCategory], title: impl Into<String>, body: impl Into<String>) -> ClassifiedEvent {
    let categories = categories.to_vec();
    let color = categories.first().map(|c| c.color()).unwrap_or_else(|| Chat.color());
    ClassifiedEvent {
        categories,
        title: title.into(),
        body: body.into(),
        color,
        mentions: Vec::new(),
    }
}

/// Classify a plain print message.
pub fn classify_print(text: &str) -> ClassifiedEvent {
    match match_print_rule(text) {
        Some(rule) => event(rule.categories, rule.title, text),
        None => event(&[Chat], DEFAULT_TITLE, text),
    }
}

/// Classify a typed packet. Fails if a field the kind needs is missing.
pub fn classify_typed(packet: &TypedPacket) -> ProtocolResult<ClassifiedEvent> {
    packet.validate()?;
    let p = &packet.payload;
    let text = p.text.as_str();

    let classified = match packet.kind {
        PacketKind::Join => event(&[Chat, Log], "Join Event", text),
        PacketKind::Leave => event(&[Chat, Log], "Leave Event", text),
        PacketKind::Chat => event(
            &[Chat],
            format!("Message from {}", p.sender.as_deref().unwrap_or_default()),
            p.message.as_deref().unwrap_or(text),
        ),
        PacketKind::Trade => event(&[Trade], "Trade Event", text),
        PacketKind::ItemSent => event(&[Trade], "Item Sent", text),
        PacketKind::Hint | PacketKind::ItemHinted => {
            if p.found.unwrap_or(false) {
                event(&[Hint, Log], "Hint Found", text)
            } else {
                event(&[Hint], "Hint Event", text)
            }
        }
        PacketKind::Collected => event(&[Log], "Collect Event", text),
        PacketKind::Released => event(&[Log], "Release Event", text),
        PacketKind::TagsUpdated => event(&[Log], "Tags Updated", text),
        PacketKind::Admin => event(&[Log], "Admin Command", text),
        PacketKind::Goaled => event(&[Chat, Log], "Goal Completed", text),
        PacketKind::Tutorial => event(&[Chat], "Tutorial", text),
        PacketKind::UserCommand => event(&[Chat], "Command Result", text),
        PacketKind::ServerChat => event(&[Chat], "Server Message", text),
        PacketKind::Message => event(&[Chat], DEFAULT_TITLE, text),
    };

    Ok(classified)
}

/// Classify any inbound message.
pub fn classify(msg: &InboundMessage) -> ProtocolResult<ClassifiedEvent> {
    match msg {
        InboundMessage::Print { text } => Ok(classify_print(text)),
        InboundMessage::Typed(packet) => classify_typed(packet),
    }
}

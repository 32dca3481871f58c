//! Frame encoding and decoding.
//!
//! A server frame holds either one packet object or an array of them. A
//! packet that fails to decode is logged and dropped without affecting the
//! rest of its frame.

use serde_json::Value;
use tracing::warn;

use super::client::ClientPacket;
use super::server::ServerPacket;
use crate::common::error::{ProtocolError, ProtocolResult};

/// Decode one text frame into server packets.
pub fn decode_frame(frame: &str) -> ProtocolResult<Vec<ServerPacket>> {
    let value: Value = serde_json::from_str(frame)?;
    match value {
        Value::Array(items) => Ok(items.into_iter().filter_map(decode_packet).collect()),
        Value::Object(_) => Ok(decode_packet(value).into_iter().collect()),
        other => Err(ProtocolError::InvalidPacket {
            message: format!("expected an object or array frame, got {}", type_name(&other)),
        }),
    }
}

fn decode_packet(value: Value) -> Option<ServerPacket> {
    let cmd = value
        .get("cmd")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_string();
    match serde_json::from_value(value) {
        Ok(packet) => Some(packet),
        Err(e) => {
            warn!(cmd = %cmd, "Dropping malformed packet: {}", e);
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Encode client packets as one array frame.
pub fn encode_frame(packets: &[ClientPacket]) -> ProtocolResult<String> {
    Ok(serde_json::to_string(packets)?)
}

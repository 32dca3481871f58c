//! Message formatting for relayed chat.
//!
//! Supported placeholders: %time, %user, %message.

use chrono::Local;

/// Default format for Discord -> Archipelago chat.
pub const DEFAULT_DISCORD_TO_ARCHIPELAGO_FORMAT: &str = "%user: %message";

/// Discord's limit for a single message body, in characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub struct MessageFormatter {
    format: String,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_DISCORD_TO_ARCHIPELAGO_FORMAT)
    }
}

impl MessageFormatter {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Substitute `%time` (HH:MM:SS), `%user` and `%message`.
    ///
    /// Placeholders are only read from the format string, so names and
    /// messages are inserted verbatim.
    pub fn format(&self, ctx: &FormatContext) -> String {
        let mut out = String::with_capacity(self.format.len() + ctx.message.len());
        let mut rest = self.format.as_str();

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            if let Some(tail) = rest.strip_prefix("%time") {
                out.push_str(&get_time());
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("%user") {
                out.push_str(&ctx.user);
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("%message") {
                out.push_str(&ctx.message);
                rest = tail;
            } else {
                out.push('%');
                rest = &rest[1..];
            }
        }
        out.push_str(rest);
        out
    }

    pub fn format_string(&self) -> &str {
        &self.format
    }
}

#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    pub user: String,
    pub message: String,
}

impl FormatContext {
    pub fn new(user: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            message: message.into(),
        }
    }
}

fn get_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Find the last UTF-8 char boundary at or before `byte_index` in `s`.
fn floor_char_boundary(s: &str, byte_index: usize) -> usize {
    if byte_index >= s.len() {
        return s.len();
    }
    let mut i = byte_index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Split a message into chunks of at most `max_len` bytes.
///
/// Splits on the last space inside the limit when there is one. Never splits
/// inside a multi-byte character.
pub fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = message;

    while !remaining.is_empty() {
        // Leading spaces left over from the previous word-boundary split
        remaining = remaining.trim_start();
        if remaining.is_empty() {
            break;
        }

        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let split_at = floor_char_boundary(remaining, max_len);

        // max_len is smaller than the first character: take it whole
        if split_at == 0 {
            let first_char_end = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
            chunks.push(remaining[..first_char_end].to_string());
            remaining = &remaining[first_char_end..];
            continue;
        }

        let chunk = &remaining[..split_at];
        match chunk.rfind(' ') {
            Some(space_idx) if space_idx > 0 => {
                chunks.push(remaining[..space_idx].to_string());
                remaining = &remaining[space_idx + 1..];
            }
            _ => {
                chunks.push(chunk.to_string());
                remaining = &remaining[split_at..];
            }
        }
    }

    chunks
}

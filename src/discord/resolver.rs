//! Emoji and mention flattening for text crossing between Discord and the
//! Archipelago server.
//!
//! The server only shows plain text, so Discord markup (`<@id>`, `<#id>`,
//! `<@&id>`, custom and unicode emojis) is turned into readable names before
//! a chat line goes upstream. Going the other way, server text is escaped so
//! slot names like `Link_2` don't turn into markdown.

use fancy_regex::{Captures, Regex};
use serenity::cache::Cache;
use serenity::model::id::{ChannelId, RoleId, UserId};

/// Name lookups for Discord ids, backed by the gateway cache in production.
pub trait NameLookup {
    fn user_name(&self, id: u64) -> Option<String>;
    fn channel_name(&self, id: u64) -> Option<String>;
    fn role_name(&self, id: u64) -> Option<String>;
}

/// [`NameLookup`] over the serenity cache.
pub struct CacheLookup<'a>(pub &'a Cache);

impl NameLookup for CacheLookup<'_> {
    fn user_name(&self, id: u64) -> Option<String> {
        self.0.user(UserId::new(id)).map(|user| user.name.clone())
    }

    fn channel_name(&self, id: u64) -> Option<String> {
        let channel_id = ChannelId::new(id);
        self.0.guilds().into_iter().find_map(|guild_id| {
            self.0
                .guild(guild_id)
                .and_then(|guild| guild.channels.get(&channel_id).map(|c| c.name.clone()))
        })
    }

    fn role_name(&self, id: u64) -> Option<String> {
        let role_id = RoleId::new(id);
        self.0.guilds().into_iter().find_map(|guild_id| {
            self.0
                .guild(guild_id)
                .and_then(|guild| guild.roles.get(&role_id).map(|r| r.name.clone()))
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageResolver {
    /// `<@123>` or `<@!123>`.
    mention_pattern: Regex,
    /// `<#123>`.
    channel_pattern: Regex,
    /// `<@&123>`.
    role_pattern: Regex,
    /// `<:name:id>` or `<a:name:id>`.
    emoji_pattern: Regex,
    /// Any mention, kept verbatim during markdown escaping.
    mention_preserve_pattern: Regex,
}

impl MessageResolver {
    pub fn new() -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            mention_pattern: Regex::new(r"<@!?(\d+)>")?,
            channel_pattern: Regex::new(r"<#(\d+)>")?,
            role_pattern: Regex::new(r"<@&(\d+)>")?,
            emoji_pattern: Regex::new(r"<a?:([a-zA-Z0-9_]+):\d+>")?,
            mention_preserve_pattern: Regex::new(r"<@[&!]?\d+>")?,
        })
    }

    /// Flatten a Discord message into plain text for the server.
    pub fn flatten_for_archipelago(&self, message: &str, names: &dyn NameLookup) -> String {
        let step1 = self.resolve_unicode_emojis_to_text(message);
        let step2 = self.resolve_role_mentions(&step1, names);
        let step3 = self.resolve_user_mentions(&step2, names);
        let step4 = self.resolve_channel_mentions(&step3, names);
        self.resolve_custom_emojis_to_text(&step4)
    }

    /// `<@123>` -> `@name`; unknown ids are left as-is.
    pub fn resolve_user_mentions(&self, message: &str, names: &dyn NameLookup) -> String {
        replace_ids(&self.mention_pattern, message, |id| {
            names.user_name(id).map(|name| format!("@{}", name))
        })
    }

    /// `<#123>` -> `#name`.
    pub fn resolve_channel_mentions(&self, message: &str, names: &dyn NameLookup) -> String {
        replace_ids(&self.channel_pattern, message, |id| {
            names.channel_name(id).map(|name| format!("#{}", name))
        })
    }

    /// `<@&123>` -> `@role`.
    pub fn resolve_role_mentions(&self, message: &str, names: &dyn NameLookup) -> String {
        replace_ids(&self.role_pattern, message, |id| {
            names.role_name(id).map(|name| format!("@{}", name))
        })
    }

    /// `<:pepega:123>` -> `:pepega:`.
    pub fn resolve_custom_emojis_to_text(&self, message: &str) -> String {
        self.emoji_pattern.replace_all(message, ":$1:").to_string()
    }

    /// Unicode emojis -> `:shortcode:`, falling back to the emoji name.
    pub fn resolve_unicode_emojis_to_text(&self, message: &str) -> String {
        let mut result = String::with_capacity(message.len() * 2);
        let mut chars = message.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch.is_ascii() {
                result.push(ch);
                continue;
            }

            if let Some(emoji) = emojis::get(ch.encode_utf8(&mut [0; 4])) {
                push_alias(&mut result, emoji);
                continue;
            }

            // Two-codepoint sequences (variation selectors, skin tones)
            let mut grapheme = ch.to_string();
            if let Some(&next) = chars.peek() {
                if !next.is_ascii() {
                    grapheme.push(next);
                    if let Some(emoji) = emojis::get(&grapheme) {
                        chars.next();
                        push_alias(&mut result, emoji);
                        continue;
                    }
                    grapheme.pop();
                }
            }
            result.push_str(&grapheme);
        }

        result
    }

    /// Escape Discord markdown outside of mention tokens.
    pub fn escape_markdown(&self, message: &str) -> String {
        let mut result = String::with_capacity(message.len());
        let mut last_end = 0;

        for m in self.mention_preserve_pattern.find_iter(message).flatten() {
            result.push_str(&escape_markdown_chars(&message[last_end..m.start()]));
            result.push_str(m.as_str());
            last_end = m.end();
        }
        result.push_str(&escape_markdown_chars(&message[last_end..]));

        result
    }
}

fn push_alias(result: &mut String, emoji: &emojis::Emoji) {
    let alias = emoji.shortcode().unwrap_or_else(|| emoji.name());
    result.push(':');
    result.push_str(alias);
    result.push(':');
}

fn replace_ids(pattern: &Regex, message: &str, lookup: impl Fn(u64) -> Option<String>) -> String {
    pattern
        .replace_all(message, |caps: &Captures| -> String {
            caps[1]
                .parse::<u64>()
                .ok()
                .and_then(&lookup)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

fn escape_markdown_chars(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '`' | '*' | '_' | '~' | '|') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    impl NameLookup for HashMap<u64, String> {
        fn user_name(&self, id: u64) -> Option<String> {
            self.get(&id).cloned()
        }

        fn channel_name(&self, id: u64) -> Option<String> {
            self.get(&id).cloned()
        }

        fn role_name(&self, id: u64) -> Option<String> {
            self.get(&id).cloned()
        }
    }

    fn resolver() -> MessageResolver {
        MessageResolver::new().unwrap()
    }

    fn names() -> HashMap<u64, String> {
        HashMap::from([
            (10, "alice".to_string()),
            (20, "general".to_string()),
            (30, "Moderators".to_string()),
        ])
    }

    #[test]
    fn test_escape_markdown() {
        let output = resolver().escape_markdown("**bold** _italic_ `code`");
        assert_eq!(output, "\\*\\*bold\\*\\* \\_italic\\_ \\`code\\`");
    }

    #[test]
    fn test_escape_markdown_preserves_mentions() {
        let input = "Link_2 found it <@123456> and <@&789012> **wow**";
        let output = resolver().escape_markdown(input);

        assert!(output.starts_with("Link\\_2 found it"));
        assert!(output.contains("<@123456>"));
        assert!(output.contains("<@&789012>"));
        assert!(output.ends_with("\\*\\*wow\\*\\*"));
    }

    #[test]
    fn test_resolve_custom_emojis_to_text() {
        let input = "Hello <:pepega:123456789> world <a:animated:987654321>";
        let output = resolver().resolve_custom_emojis_to_text(input);
        assert_eq!(output, "Hello :pepega: world :animated:");
    }

    #[test]
    fn test_resolve_unicode_emojis() {
        let resolver = resolver();

        let output = resolver.resolve_unicode_emojis_to_text("Hello \u{1F600} world");
        assert!(output.contains("grinning"), "got: {}", output);
        assert!(output.starts_with("Hello :"));

        let output = resolver.resolve_unicode_emojis_to_text("\u{1F600}\u{1F602}\u{1F44D}");
        assert!(output.contains("grinning"), "got: {}", output);
        assert!(output.contains("joy"), "got: {}", output);
        assert!(output.contains("+1"), "got: {}", output);
    }

    #[test]
    fn test_non_emoji_unicode_kept() {
        let output = resolver().resolve_unicode_emojis_to_text("caf\u{e9} na\u{ef}ve");
        assert_eq!(output, "caf\u{e9} na\u{ef}ve");
    }

    #[test]
    fn test_mentions_flattened() {
        let output = resolver().flatten_for_archipelago(
            "hey <@10> and <@!10>, see <#20> or ask <@&30>",
            &names(),
        );
        assert_eq!(
            output,
            "hey @alice and @alice, see #general or ask @Moderators"
        );
    }

    #[test]
    fn test_unknown_ids_left_alone() {
        let output = resolver().flatten_for_archipelago("ping <@99> in <#98>", &names());
        assert_eq!(output, "ping <@99> in <#98>");
    }

    #[test]
    fn test_standard_shortcodes_exist() {
        assert_eq!(emojis::get_by_shortcode("grinning").unwrap().as_str(), "\u{1F600}");
        assert_eq!(emojis::get_by_shortcode("+1").unwrap().as_str(), "\u{1F44D}");
    }
}

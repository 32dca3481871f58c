//! Message filtering with regex patterns.
//!
//! Filters messages based on configurable regex patterns to keep spam or
//! unwanted text from being relayed between Discord and the Archipelago server.

use fancy_regex::Regex;
use tracing::warn;

use crate::config::types::FiltersConfig;

/// Direction of message flow for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDirection {
    /// Archipelago to Discord.
    ToDiscord,
    /// Discord to Archipelago.
    ToArchipelago,
}

/// Message filter that checks messages against regex patterns.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    to_discord_patterns: Vec<CompiledPattern>,
    to_archipelago_patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl MessageFilter {
    /// Create a new message filter from pattern strings.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(to_discord: Option<Vec<String>>, to_archipelago: Option<Vec<String>>) -> Self {
        Self {
            to_discord_patterns: compile_patterns(to_discord.unwrap_or_default()),
            to_archipelago_patterns: compile_patterns(to_archipelago.unwrap_or_default()),
        }
    }

    /// Create an empty filter that allows all messages.
    pub fn empty() -> Self {
        Self {
            to_discord_patterns: Vec::new(),
            to_archipelago_patterns: Vec::new(),
        }
    }

    /// Build the relay filter from config. `patterns` apply both ways, the
    /// direction lists only to their own direction.
    pub fn from_config(filters: Option<&FiltersConfig>) -> Self {
        match filters {
            Some(f) if f.enabled => Self::new(
                Some(f.to_discord_patterns()),
                Some(f.to_archipelago_patterns()),
            ),
            _ => Self::empty(),
        }
    }

    /// Returns `true` if the message matches any pattern for `direction` and should be blocked.
    pub fn should_filter(&self, direction: FilterDirection, message: &str) -> bool {
        let patterns = match direction {
            FilterDirection::ToDiscord => &self.to_discord_patterns,
            FilterDirection::ToArchipelago => &self.to_archipelago_patterns,
        };

        patterns.iter().any(|p| {
            p.regex.is_match(message).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }

    /// Returns true if the filter has any patterns configured.
    pub fn has_patterns(&self) -> bool {
        !self.to_discord_patterns.is_empty() || !self.to_archipelago_patterns.is_empty()
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: Vec<String>) -> Vec<CompiledPattern> {
    patterns
        .into_iter()
        .filter_map(|pattern| match Regex::new(&pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern,
                regex,
            }),
            Err(e) => {
                warn!("Invalid filter regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

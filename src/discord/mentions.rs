//! Discord mentions for players named in relayed text.
//!
//! Candidate names are runs of capitalized words, optionally followed by a
//! `(Team #N)` suffix that is not part of the name. Each distinct candidate is
//! looked up in the link store and linked owners are pinged.

use std::collections::HashSet;
use std::sync::Arc;

use fancy_regex::Regex;
use tracing::{debug, warn};

use crate::common::messages::Mention;
use crate::storage::UserLinkStore;

/// A name word may contain apostrophes but ends before a possessive `'s`.
const NAME_PATTERN: &str =
    r"\b([A-Z](?:[\w-]|'(?!s\b))*(?: [A-Z](?:[\w-]|'(?!s\b))*)*)(?: \(Team #\d+\))?";

/// Resolves player names in message text to Discord mentions.
#[derive(Clone)]
pub struct MentionResolver {
    store: Arc<dyn UserLinkStore>,
    name_pattern: Regex,
}

impl MentionResolver {
    pub fn new(store: Arc<dyn UserLinkStore>) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            store,
            name_pattern: Regex::new(NAME_PATTERN)?,
        })
    }

    /// Distinct candidate player names in first-seen order.
    pub fn extract_names(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for caps in self.name_pattern.captures_iter(text) {
            let caps = match caps {
                Ok(caps) => caps,
                Err(e) => {
                    warn!("Name extraction stopped early: {}", e);
                    break;
                }
            };
            if let Some(name) = caps.get(1) {
                let name = name.as_str();
                if seen.insert(name.to_string()) {
                    names.push(name.to_string());
                }
            }
        }

        names
    }

    /// Mentions for every linked name in `text`, in extraction order.
    ///
    /// Lookup failures are logged and skipped. A user who owns several of the
    /// named slots is mentioned once.
    pub async fn resolve_mentions(&self, text: &str) -> Vec<Mention> {
        let mut mentioned = HashSet::new();
        let mut mentions = Vec::new();

        for name in self.extract_names(text) {
            match self.store.find_by_slot(&name).await {
                Ok(Some(link)) => {
                    if mentioned.insert(link.discord_id) {
                        mentions.push(Mention {
                            discord_id: link.discord_id,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(slot = %name, "Link lookup failed: {}", e);
                }
            }
        }

        if !mentions.is_empty() {
            debug!("Resolved {} mention(s)", mentions.len());
        }
        mentions
    }
}

//! Rendering of `PrintJSON` parts into plain text.
//!
//! Numeric ids are resolved through the room roster (slot -> player) and the
//! data package (item and location ids, per game). Ids that cannot be
//! resolved are rendered as they arrived.

use std::collections::HashMap;

use tracing::debug;

use super::packets::{DataPackageContents, JsonMessagePart, NetworkPlayer, NetworkSlot};

/// Players and games of the connected room, keyed by slot number.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    names: HashMap<i64, String>,
    games: HashMap<i64, String>,
}

impl Roster {
    /// Replace player names; aliases win over slot names.
    pub fn update_players(&mut self, players: &[NetworkPlayer]) {
        for player in players {
            let name = if player.alias.is_empty() {
                &player.name
            } else {
                &player.alias
            };
            self.names.insert(player.slot, name.clone());
        }
    }

    pub fn update_slots(&mut self, slot_info: &HashMap<String, NetworkSlot>) {
        for (slot, info) in slot_info {
            match slot.parse::<i64>() {
                Ok(slot) => {
                    self.games.insert(slot, info.game.clone());
                    self.names.entry(slot).or_insert_with(|| info.name.clone());
                }
                Err(_) => debug!("Ignoring non-numeric slot key '{}'", slot),
            }
        }
    }

    pub fn player_name(&self, slot: i64) -> Option<&str> {
        self.names.get(&slot).map(String::as_str)
    }

    pub fn game(&self, slot: i64) -> Option<&str> {
        self.games.get(&slot).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// Reverse lookup tables built from the data package.
#[derive(Debug, Clone, Default)]
struct GameNames {
    items: HashMap<i64, String>,
    locations: HashMap<i64, String>,
}

#[derive(Debug, Clone, Default)]
pub struct TextRenderer {
    roster: Roster,
    games: HashMap<String, GameNames>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    /// Merge a data package; games already loaded are replaced.
    pub fn load_data_package(&mut self, data: &DataPackageContents) {
        for (game, tables) in &data.games {
            let names = GameNames {
                items: tables
                    .item_name_to_id
                    .iter()
                    .map(|(name, id)| (*id, name.clone()))
                    .collect(),
                locations: tables
                    .location_name_to_id
                    .iter()
                    .map(|(name, id)| (*id, name.clone()))
                    .collect(),
            };
            self.games.insert(game.clone(), names);
        }
        debug!("Data package holds {} game(s)", self.games.len());
    }

    pub fn player_name(&self, slot: i64) -> Option<&str> {
        self.roster.player_name(slot)
    }

    /// Item name as seen by `owner`'s game, or by any game when the owner is unknown.
    pub fn item_name(&self, owner: Option<i64>, id: i64) -> Option<&str> {
        self.lookup(owner, |names| names.items.get(&id))
    }

    pub fn location_name(&self, owner: Option<i64>, id: i64) -> Option<&str> {
        self.lookup(owner, |names| names.locations.get(&id))
    }

    fn lookup<'a>(
        &'a self,
        owner: Option<i64>,
        find: impl Fn(&'a GameNames) -> Option<&'a String>,
    ) -> Option<&'a str> {
        let owner_game = owner
            .and_then(|slot| self.roster.game(slot))
            .and_then(|game| self.games.get(game));

        let name = match owner_game {
            Some(names) => find(names),
            None => self.games.values().find_map(&find),
        };
        name.map(String::as_str)
    }

    /// Render one part to text.
    pub fn render_part(&self, part: &JsonMessagePart) -> String {
        let id = || part.text.parse::<i64>().ok();
        let resolved = match part.kind.as_deref() {
            Some("player_id") => id().and_then(|slot| self.player_name(slot)),
            Some("item_id") => id().and_then(|item| self.item_name(part.player, item)),
            Some("location_id") => {
                id().and_then(|location| self.location_name(part.player, location))
            }
            _ => None,
        };
        resolved.unwrap_or(part.text.as_str()).to_string()
    }

    /// Render a full message.
    pub fn render(&self, parts: &[JsonMessagePart]) -> String {
        parts.iter().map(|part| self.render_part(part)).collect()
    }
}

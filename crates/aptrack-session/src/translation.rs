//! Identifier-to-name translation tables, built from data packages.
//!
//! Tables are keyed by game name and stamped with the `(version,
//! checksum)` they were built from. Receiving the same stamp again is a
//! cache hit and is not re-parsed; a different stamp replaces the table.

use std::collections::HashMap;

use aptrack_protocol::{GameData, ItemId, LocationId};

/// Reverse lookup tables for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameTables {
    pub version: u32,
    pub checksum: Option<String>,
    items: HashMap<ItemId, String>,
    locations: HashMap<LocationId, String>,
}

impl GameTables {
    fn build(data: &GameData) -> Self {
        Self {
            version: data.version,
            checksum: data.checksum.clone(),
            items: data
                .item_name_to_id
                .iter()
                .map(|(name, id)| (*id, name.clone()))
                .collect(),
            locations: data
                .location_name_to_id
                .iter()
                .map(|(name, id)| (*id, name.clone()))
                .collect(),
        }
    }

    fn matches(&self, data: &GameData) -> bool {
        self.version == data.version && self.checksum == data.checksum
    }
}

/// What [`TranslationCache::merge`] did with a game's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// Same version and checksum as the cached table; nothing parsed.
    Unchanged,
}

/// Translation tables for every game seen so far.
#[derive(Debug, Clone, Default)]
pub struct TranslationCache {
    games: HashMap<String, GameTables>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, game: &str, data: &GameData) -> MergeOutcome {
        match self.games.get(game) {
            Some(cached) if cached.matches(data) => {
                tracing::trace!(game, version = data.version, "data package cache hit");
                MergeOutcome::Unchanged
            }
            Some(_) => {
                tracing::debug!(game, version = data.version, "replacing translation tables");
                self.games.insert(game.to_string(), GameTables::build(data));
                MergeOutcome::Replaced
            }
            None => {
                tracing::debug!(
                    game,
                    items = data.item_name_to_id.len(),
                    locations = data.location_name_to_id.len(),
                    "caching translation tables"
                );
                self.games.insert(game.to_string(), GameTables::build(data));
                MergeOutcome::Inserted
            }
        }
    }

    pub fn tables(&self, game: &str) -> Option<&GameTables> {
        self.games.get(game)
    }

    /// Whether `game` is cached with exactly this checksum.
    pub fn has_checksum(&self, game: &str, checksum: &str) -> bool {
        self.games
            .get(game)
            .and_then(|tables| tables.checksum.as_deref())
            == Some(checksum)
    }

    pub fn item_name(&self, game: &str, id: ItemId) -> Option<&str> {
        self.games.get(game)?.items.get(&id).map(String::as_str)
    }

    pub fn location_name(&self, game: &str, id: LocationId) -> Option<&str> {
        self.games.get(game)?.locations.get(&id).map(String::as_str)
    }

    /// The item's name, or its raw identifier if unknown.
    pub fn item_or_raw(&self, game: Option<&str>, id: ItemId) -> String {
        game.and_then(|game| self.item_name(game, id))
            .map_or_else(|| id.to_string(), str::to_string)
    }

    /// The location's name, or its raw identifier if unknown.
    pub fn location_or_raw(&self, game: Option<&str>, id: LocationId) -> String {
        game.and_then(|game| self.location_name(game, id))
            .map_or_else(|| id.to_string(), str::to_string)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zelda(version: u32, checksum: &str, sword: &str) -> GameData {
        GameData {
            item_name_to_id: [(sword.to_string(), ItemId(1))].into(),
            location_name_to_id: [("Cave".to_string(), LocationId(10))].into(),
            version,
            checksum: Some(checksum.to_string()),
        }
    }

    #[test]
    fn test_merge_new_game_inserts() {
        let mut cache = TranslationCache::new();
        let outcome = cache.merge("Zelda", &zelda(1, "a", "Sword"));

        assert_eq!(outcome, MergeOutcome::Inserted);
        assert_eq!(cache.item_name("Zelda", ItemId(1)), Some("Sword"));
        assert_eq!(cache.location_name("Zelda", LocationId(10)), Some("Cave"));
    }

    #[test]
    fn test_merge_same_stamp_is_a_cache_hit() {
        let mut cache = TranslationCache::new();
        cache.merge("Zelda", &zelda(1, "a", "Sword"));

        // Different content under the same stamp is not re-parsed.
        let outcome = cache.merge("Zelda", &zelda(1, "a", "Master Sword"));

        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(cache.item_name("Zelda", ItemId(1)), Some("Sword"));
    }

    #[test]
    fn test_merge_new_checksum_replaces() {
        let mut cache = TranslationCache::new();
        cache.merge("Zelda", &zelda(1, "a", "Sword"));

        let outcome = cache.merge("Zelda", &zelda(1, "b", "Master Sword"));

        assert_eq!(outcome, MergeOutcome::Replaced);
        assert_eq!(cache.item_name("Zelda", ItemId(1)), Some("Master Sword"));
        assert!(cache.has_checksum("Zelda", "b"));
        assert!(!cache.has_checksum("Zelda", "a"));
    }

    #[test]
    fn test_unknown_ids_fall_back_to_raw() {
        let cache = TranslationCache::new();
        assert_eq!(cache.item_or_raw(Some("Zelda"), ItemId(42)), "42");
        assert_eq!(cache.location_or_raw(None, LocationId(-1)), "-1");
    }
}

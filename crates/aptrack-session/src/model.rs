//! The reconciled session model.
//!
//! These are plain data. Only the [`Reconciler`](crate::Reconciler)
//! mutates them; everyone else reads a clone or a shared snapshot.

use std::fmt;
use std::time::SystemTime;

use aptrack_protocol::{ItemFlags, ItemId, LocationId, SlotId};
use serde::{Deserialize, Serialize};

/// The root aggregate: everything known about one multiworld room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Seed name from the latest `RoomInfo`.
    pub room_name: Option<String>,
    pub team: Option<u32>,
    /// The slot this tracker authenticated as.
    pub own_slot: Option<SlotId>,
    pub hint_points: u32,
    pub hint_cost: u32,
    /// One entry per playable slot, in discovery order.
    pub games: Vec<Game>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            room_name: None,
            team: None,
            own_slot: None,
            hint_points: 0,
            hint_cost: 0,
            games: Vec::new(),
        }
    }

    pub fn game(&self, slot: SlotId) -> Option<&Game> {
        self.games.iter().find(|game| game.slot == slot)
    }

    pub(crate) fn game_mut(&mut self, slot: SlotId) -> Option<&mut Game> {
        self.games.iter_mut().find(|game| game.slot == slot)
    }

    /// The game of the slot this tracker authenticated as.
    pub fn own_game(&self) -> Option<&Game> {
        self.own_slot.and_then(|slot| self.game(slot))
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            games: self.games.len(),
            ..SessionSummary::default()
        };
        for game in &self.games {
            summary.locations_total += game.locations.len();
            summary.locations_found += game.found_count();
            summary.items += game.items.len();
            summary.hints += game.hints.len();
        }
        summary
    }
}

/// Counts for a one-line status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub games: usize,
    pub locations_found: usize,
    pub locations_total: usize,
    pub items: usize,
    pub hints: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} games, {}/{} locations, {} items, {} hints",
            self.games,
            self.locations_found,
            self.locations_total,
            self.items,
            self.hints
        )
    }
}

/// One playable slot and everything reconciled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub slot: SlotId,
    /// Stable identifier derived from the slot number (`game-3`).
    pub id: String,
    /// The game being played, e.g. `"A Link to the Past"`.
    pub game: String,
    /// Slot name chosen at generation time.
    pub player: String,
    /// Current display alias; follows `RoomUpdate.players`.
    pub alias: String,
    pub locations: Vec<Location>,
    /// Items delivered to this slot.
    pub items: Vec<Item>,
    /// Hints about items this slot will receive.
    pub hints: Vec<Hint>,
}

impl Game {
    pub(crate) fn new(slot: SlotId, game: String, player: String, alias: String) -> Self {
        Self {
            slot,
            id: Self::id_for(slot),
            game,
            player,
            alias,
            locations: Vec::new(),
            items: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn id_for(slot: SlotId) -> String {
        format!("game-{}", slot.0)
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.iter().find(|location| location.id == id)
    }

    pub(crate) fn location_mut(&mut self, id: LocationId) -> Option<&mut Location> {
        self.locations.iter_mut().find(|location| location.id == id)
    }

    pub fn found_count(&self) -> usize {
        self.locations.iter().filter(|l| l.is_found()).count()
    }
}

/// A location in one game's world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    /// Resolved name, or the raw identifier until tables arrive.
    pub name: String,
    pub game: SlotId,
    /// Reachability per game logic. Supplied by an outside logic
    /// engine; nothing in this crate computes it.
    pub in_logic: bool,
    pub found: Option<Discovery>,
    /// What a `LocationScouts` reply said sits here.
    pub scouted: Option<ScoutedItem>,
}

impl Location {
    pub fn is_found(&self) -> bool {
        self.found.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub by: SlotId,
    pub at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoutedItem {
    pub item: ItemId,
    pub name: String,
    /// The slot the item is for.
    pub receiver: SlotId,
    pub flags: ItemFlags,
}

/// One item delivery, recorded on the receiving game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Destination slot; the game whose collection holds this record.
    pub owner: SlotId,
    /// Slot whose world the item was found in.
    pub source: SlotId,
    /// `None` for server-side pseudo locations (cheats, starting items).
    pub location: Option<LocationId>,
    pub location_name: Option<String>,
    /// Position in the slot's delivery sequence.
    pub index: u32,
    pub flags: ItemFlags,
    pub received_at: SystemTime,
}

/// Hint importance, ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
pub enum Importance {
    Low,
    Medium,
    High,
}

impl Importance {
    pub fn from_flags(flags: ItemFlags) -> Self {
        if flags.is_progression() {
            Self::High
        } else if flags.is_useful() {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    /// `{target}-{sender}-{location}-{item}`; unique within a session.
    pub id: String,
    pub text: String,
    /// Slot whose world holds the item.
    pub sender: SlotId,
    /// Slot that will receive the item.
    pub target: SlotId,
    pub item: ItemId,
    pub location: LocationId,
    pub importance: Importance,
    pub found: bool,
    pub discovered_at: SystemTime,
}

impl Hint {
    pub fn id_for(target: SlotId, sender: SlotId, location: LocationId, item: ItemId) -> String {
        format!("{}-{}-{}-{}", target.0, sender.0, location, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: i64, found: bool) -> Location {
        Location {
            id: LocationId(id),
            name: id.to_string(),
            game: SlotId(1),
            in_logic: false,
            found: found.then(|| Discovery {
                by: SlotId(1),
                at: SystemTime::UNIX_EPOCH,
            }),
            scouted: None,
        }
    }

    #[test]
    fn test_importance_is_ordered() {
        assert!(Importance::Low < Importance::Medium);
        assert!(Importance::Medium < Importance::High);
    }

    #[test]
    fn test_importance_from_flags_prefers_progression() {
        let both = ItemFlags(ItemFlags::PROGRESSION | ItemFlags::USEFUL);
        assert_eq!(Importance::from_flags(both), Importance::High);
        assert_eq!(
            Importance::from_flags(ItemFlags(ItemFlags::USEFUL)),
            Importance::Medium
        );
        assert_eq!(
            Importance::from_flags(ItemFlags(ItemFlags::TRAP)),
            Importance::Low
        );
    }

    #[test]
    fn test_game_id_derives_from_slot() {
        assert_eq!(Game::id_for(SlotId(7)), "game-7");
    }

    #[test]
    fn test_summary_counts_across_games() {
        let mut session = Session::new("s");
        let mut a = Game::new(SlotId(1), "Zelda".into(), "A".into(), "A".into());
        a.locations = vec![location(1, true), location(2, false)];
        let mut b = Game::new(SlotId(2), "Metroid".into(), "B".into(), "B".into());
        b.locations = vec![location(3, true)];
        session.games = vec![a, b];

        let summary = session.summary();
        assert_eq!(summary.games, 2);
        assert_eq!(summary.locations_found, 2);
        assert_eq!(summary.locations_total, 3);
        assert_eq!(
            summary.to_string(),
            "2 games, 2/3 locations, 0 items, 0 hints"
        );
    }

    #[test]
    fn test_session_serializes_to_json() {
        let session = Session::new("abc");
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["id"], "abc");
        assert!(json["games"].as_array().unwrap().is_empty());
    }
}

//! Folds server packets into the [`Session`] aggregate.
//!
//! Every fold is idempotent: applying the same packet twice leaves the
//! session as it was after the first application. Folds touching
//! different games, locations or items commute.
//!
//! Packets that need the slot table (`ReceivedItems`, `LocationInfo`,
//! location deltas in `RoomUpdate`, hint messages) and arrive before it
//! are deferred, not dropped, and replayed after the next `Connected`.
//! Once the slot table is known, a packet naming a slot with no game is
//! reported and dropped. Hints for a group slot go to its members' games.
//!
//! ```text
//! RoomInfo ──→ room name
//! Connected ──→ roster ──→ own locations ──→ replay deferred
//! DataPackage ──→ translation cache ──→ (changed?) re-resolve names
//! ReceivedItems / LocationInfo / RoomUpdate / PrintJSON ──→ game data
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::SystemTime;

use aptrack_protocol::{
    Connected, DataPackage, ItemId, JsonMessagePart, LocationId,
    LocationInfo, PrintJson, ReceivedItems, RoomInfo, RoomUpdate, SlotId,
};

use crate::translation::{MergeOutcome, TranslationCache};
use crate::{
    Diagnostics, Discovery, Game, Hint, Importance, Item, Location,
    ReconcileError, ScoutedItem, Session,
};

/// Maximum number of packets held while waiting for the slot table.
pub const DEFERRED_CAPACITY: usize = 256;

/// A packet waiting for the slot table.
#[derive(Debug, Clone)]
enum Deferred {
    Items(ReceivedItems),
    Scouts(LocationInfo),
    Locations {
        checked: Option<Vec<LocationId>>,
        missing: Option<Vec<LocationId>>,
    },
    Hint(PrintJson),
}

impl Deferred {
    fn cmd(&self) -> &'static str {
        match self {
            Self::Items(_) => "ReceivedItems",
            Self::Scouts(_) => "LocationInfo",
            Self::Locations { .. } => "RoomUpdate",
            Self::Hint(_) => "PrintJSON",
        }
    }
}

/// Sole owner and mutator of a [`Session`].
pub struct Reconciler {
    session: Session,
    translations: TranslationCache,
    /// Game per slot from the latest slot table, groups included.
    slot_games: BTreeMap<SlotId, String>,
    /// Display name per slot: alias when known, else slot name.
    slot_names: BTreeMap<SlotId, String>,
    /// Member slots of every group slot in the latest slot table.
    group_members: BTreeMap<SlotId, Vec<SlotId>>,
    deferred: VecDeque<Deferred>,
    diagnostics: Diagnostics,
}

impl Reconciler {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session: Session::new(session_id),
            translations: TranslationCache::new(),
            slot_games: BTreeMap::new(),
            slot_names: BTreeMap::new(),
            group_members: BTreeMap::new(),
            deferred: VecDeque::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn translations(&self) -> &TranslationCache {
        &self.translations
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Number of packets waiting for the slot table.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    // -----------------------------------------------------------------------
    // Folds
    // -----------------------------------------------------------------------

    pub fn fold_room_info(&mut self, info: &RoomInfo) {
        self.session.room_name = Some(info.seed_name.clone());
        self.session.hint_cost = info.hint_cost;
        tracing::debug!(seed = %info.seed_name, games = info.games.len(), "folded room info");
    }

    /// Builds the roster from the slot table, skipping group slots.
    ///
    /// Games of slots still present keep everything reconciled so far;
    /// games of slots that vanished are removed.
    pub fn fold_connected(&mut self, connected: &Connected) {
        self.session.own_slot = Some(connected.slot);
        self.session.team = Some(connected.team);
        self.session.hint_points = connected.hint_points;

        self.slot_games = connected
            .slot_info
            .iter()
            .map(|(slot, info)| (*slot, info.game.clone()))
            .collect();
        self.slot_names = connected
            .slot_info
            .iter()
            .map(|(slot, info)| (*slot, info.name.clone()))
            .collect();
        for player in &connected.players {
            self.slot_names.insert(player.slot, player.alias.clone());
        }
        self.group_members = connected
            .slot_info
            .iter()
            .filter(|(_, info)| info.slot_type.is_group())
            .map(|(slot, info)| (*slot, info.group_members.clone()))
            .collect();

        let mut playable = BTreeSet::new();
        for (slot, info) in &connected.slot_info {
            if info.slot_type.is_group() {
                tracing::trace!(%slot, name = %info.name, "skipping group slot");
                continue;
            }
            playable.insert(*slot);

            let alias = connected
                .players
                .iter()
                .find(|player| player.slot == *slot)
                .map_or_else(|| info.name.clone(), |player| player.alias.clone());

            match self.session.game_mut(*slot) {
                Some(game) => {
                    game.game = info.game.clone();
                    game.player = info.name.clone();
                    game.alias = alias;
                }
                None => {
                    tracing::info!(%slot, game = %info.game, player = %info.name, "game discovered");
                    self.session.games.push(Game::new(
                        *slot,
                        info.game.clone(),
                        info.name.clone(),
                        alias,
                    ));
                }
            }
        }

        let before = self.session.games.len();
        self.session.games.retain(|game| playable.contains(&game.slot));
        let removed = before - self.session.games.len();
        if removed > 0 {
            tracing::info!(removed, "dropped games for slots no longer in the room");
        }

        self.apply_locations(
            connected.slot,
            &connected.checked_locations,
            &connected.missing_locations,
        );
        self.refresh_names();

        tracing::debug!(
            slot = %connected.slot,
            games = self.session.games.len(),
            "folded connected"
        );
        self.replay_deferred();
    }

    /// Merges translation tables and re-resolves names if any changed.
    pub fn fold_data_package(&mut self, package: &DataPackage) {
        let mut changed = false;
        for (game, data) in &package.data.games {
            if self.translations.merge(game, data) != MergeOutcome::Unchanged {
                changed = true;
            }
        }
        if changed {
            self.refresh_names();
        }
        tracing::debug!(games = package.data.games.len(), changed, "folded data package");
    }

    /// Records items delivered to the connected slot.
    pub fn fold_received_items(&mut self, packet: &ReceivedItems) {
        if let Err(cause) = self.try_items(packet) {
            self.defer(Deferred::Items(packet.clone()), cause);
        }
    }

    /// Records scouted contents on matching locations of the connected
    /// slot. Never marks a location found.
    pub fn fold_location_info(&mut self, info: &LocationInfo) {
        if let Err(cause) = self.try_scouts(info) {
            self.defer(Deferred::Scouts(info.clone()), cause);
        }
    }

    /// Applies only the fields present in `update`.
    pub fn fold_room_update(&mut self, update: &RoomUpdate) {
        if let Some(points) = update.hint_points {
            self.session.hint_points = points;
        }

        if let Some(players) = &update.players {
            for player in players {
                self.slot_names.insert(player.slot, player.alias.clone());
                if let Some(game) = self.session.game_mut(player.slot) {
                    game.alias = player.alias.clone();
                }
            }
        }

        if update.checked_locations.is_none() && update.missing_locations.is_none() {
            return;
        }
        let checked = update.checked_locations.as_deref().unwrap_or_default();
        let missing = update.missing_locations.as_deref().unwrap_or_default();
        if let Err(cause) = self.try_locations(checked, missing) {
            self.defer(
                Deferred::Locations {
                    checked: update.checked_locations.clone(),
                    missing: update.missing_locations.clone(),
                },
                cause,
            );
        }
    }

    /// Records a hint from a `PrintJSON` packet of type `Hint`. Other
    /// messages are ignored.
    pub fn fold_print_json(&mut self, print: &PrintJson) {
        if print.kind.as_deref() != Some("Hint") {
            return;
        }
        if print.receiving.is_none() || print.item.is_none() {
            tracing::debug!("hint message without receiving slot or item");
            return;
        }
        if let Err(cause) = self.try_hint(print) {
            self.defer(Deferred::Hint(print.clone()), cause);
        }
    }

    /// Sets the externally computed reachability of one location.
    /// Returns `false` if the location is not tracked.
    pub fn set_in_logic(&mut self, slot: SlotId, location: LocationId, in_logic: bool) -> bool {
        match self
            .session
            .game_mut(slot)
            .and_then(|game| game.location_mut(location))
        {
            Some(entry) => {
                entry.in_logic = in_logic;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Fold bodies
    // -----------------------------------------------------------------------

    fn own_slot(&self, cmd: &'static str) -> Result<SlotId, ReconcileError> {
        let slot = self
            .session
            .own_slot
            .ok_or(ReconcileError::NotConnected { cmd })?;
        if self.session.game(slot).is_none() {
            return Err(ReconcileError::UnknownSlot { cmd, slot });
        }
        Ok(slot)
    }

    fn try_items(&mut self, packet: &ReceivedItems) -> Result<(), ReconcileError> {
        let owner = self.own_slot("ReceivedItems")?;
        let Some(game) = self.session.game_mut(owner) else {
            return Err(ReconcileError::UnknownSlot { cmd: "ReceivedItems", slot: owner });
        };
        let now = SystemTime::now();

        let mut added = 0usize;
        for (offset, network) in packet.items.iter().enumerate() {
            let index = packet.index.saturating_add(offset as u32);
            let location = (network.location.0 >= 0).then_some(network.location);

            let duplicate = game.items.iter().any(|item| {
                item.id == network.item
                    && item.location == location
                    && item.source == network.player
                    && item.index == index
            });
            if duplicate {
                tracing::trace!(item = %network.item, index, "item already recorded");
                continue;
            }

            let source_game = self.slot_games.get(&network.player).map(String::as_str);
            game.items.push(Item {
                id: network.item,
                name: self.translations.item_or_raw(Some(&game.game), network.item),
                owner,
                source: network.player,
                location,
                location_name: location
                    .map(|id| self.translations.location_or_raw(source_game, id)),
                index,
                flags: network.flags,
                received_at: now,
            });
            added += 1;
        }

        tracing::debug!(
            index = packet.index,
            received = packet.items.len(),
            added,
            "folded received items"
        );
        Ok(())
    }

    fn try_scouts(&mut self, info: &LocationInfo) -> Result<(), ReconcileError> {
        let slot = self.own_slot("LocationInfo")?;
        let Some(game) = self.session.game_mut(slot) else {
            return Err(ReconcileError::UnknownSlot { cmd: "LocationInfo", slot });
        };

        for network in &info.locations {
            let Some(location) = game.location_mut(network.location) else {
                tracing::trace!(location = %network.location, "scouted location not tracked");
                continue;
            };
            let receiver_game = self.slot_games.get(&network.player).map(String::as_str);
            location.scouted = Some(ScoutedItem {
                item: network.item,
                name: self.translations.item_or_raw(receiver_game, network.item),
                receiver: network.player,
                flags: network.flags,
            });
        }
        Ok(())
    }

    fn try_locations(
        &mut self,
        checked: &[LocationId],
        missing: &[LocationId],
    ) -> Result<(), ReconcileError> {
        let slot = self.own_slot("RoomUpdate")?;
        self.apply_locations(slot, checked, missing);
        Ok(())
    }

    /// Creates missing locations and marks checked ones found by `slot`.
    ///
    /// A found location is never un-found, so a location listed as both
    /// checked and missing ends up found.
    fn apply_locations(&mut self, slot: SlotId, checked: &[LocationId], missing: &[LocationId]) {
        let Some(game) = self.session.game_mut(slot) else {
            return;
        };
        let now = SystemTime::now();

        for &id in missing {
            if game.location(id).is_none() {
                let name = self.translations.location_or_raw(Some(&game.game), id);
                game.locations.push(Location {
                    id,
                    name,
                    game: slot,
                    in_logic: false,
                    found: None,
                    scouted: None,
                });
            }
        }

        for &id in checked {
            let discovery = Discovery { by: slot, at: now };
            match game.location_mut(id) {
                Some(location) if location.is_found() => {}
                Some(location) => {
                    tracing::trace!(location = %id, %slot, "location found");
                    location.found = Some(discovery);
                }
                None => {
                    let name = self.translations.location_or_raw(Some(&game.game), id);
                    game.locations.push(Location {
                        id,
                        name,
                        game: slot,
                        in_logic: false,
                        found: Some(discovery),
                        scouted: None,
                    });
                }
            }
        }
    }

    fn try_hint(&mut self, print: &PrintJson) -> Result<(), ReconcileError> {
        let (Some(target), Some(network)) = (print.receiving, print.item.as_ref()) else {
            return Ok(());
        };
        if self.session.own_slot.is_none() {
            return Err(ReconcileError::NotConnected { cmd: "PrintJSON" });
        }

        // A hint for an item-link group lands on every member's game.
        let holders: Vec<SlotId> = match self.group_members.get(&target) {
            Some(members) => members
                .iter()
                .copied()
                .filter(|member| self.session.game(*member).is_some())
                .collect(),
            None if self.session.game(target).is_some() => vec![target],
            None => Vec::new(),
        };
        if holders.is_empty() {
            return Err(ReconcileError::UnknownSlot { cmd: "PrintJSON", slot: target });
        }

        let text = self.render(&print.data);
        let hint = Hint {
            id: Hint::id_for(target, network.player, network.location, network.item),
            text,
            sender: network.player,
            target,
            item: network.item,
            location: network.location,
            importance: Importance::from_flags(network.flags),
            found: print.found.unwrap_or(false),
            discovered_at: SystemTime::now(),
        };

        for slot in holders {
            let Some(game) = self.session.game_mut(slot) else {
                continue;
            };
            if game.hints.iter().any(|known| known.id == hint.id) {
                tracing::trace!(hint = %hint.id, %slot, "hint already recorded");
                continue;
            }
            tracing::debug!(hint = %hint.id, %slot, "hint recorded");
            game.hints.push(hint.clone());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------------

    fn game_of(&self, slot: Option<SlotId>) -> Option<&str> {
        slot.and_then(|slot| self.slot_games.get(&slot))
            .map(String::as_str)
    }

    /// Concatenates message parts, resolving id parts to names.
    fn render(&self, parts: &[JsonMessagePart]) -> String {
        parts.iter().map(|part| self.render_part(part)).collect()
    }

    fn render_part(&self, part: &JsonMessagePart) -> String {
        let text = part.text.as_deref().unwrap_or_default();
        match part.kind.as_deref() {
            Some("player_id") => text
                .parse()
                .ok()
                .and_then(|slot| self.slot_names.get(&SlotId(slot)))
                .cloned()
                .unwrap_or_else(|| text.to_string()),
            Some("item_id") => match text.parse() {
                Ok(id) => self.translations.item_or_raw(self.game_of(part.player), ItemId(id)),
                Err(_) => text.to_string(),
            },
            Some("location_id") => match text.parse() {
                Ok(id) => self
                    .translations
                    .location_or_raw(self.game_of(part.player), LocationId(id)),
                Err(_) => text.to_string(),
            },
            _ => text.to_string(),
        }
    }

    /// Re-resolves every item, location and scouted-item name.
    fn refresh_names(&mut self) {
        let translations = &self.translations;
        let slot_games = &self.slot_games;
        let game_of = |slot: &SlotId| slot_games.get(slot).map(String::as_str);

        for game in &mut self.session.games {
            let own = Some(game.game.as_str());
            for location in &mut game.locations {
                location.name = translations.location_or_raw(own, location.id);
                if let Some(scouted) = &mut location.scouted {
                    scouted.name = translations.item_or_raw(game_of(&scouted.receiver), scouted.item);
                }
            }
            for item in &mut game.items {
                item.name = translations.item_or_raw(own, item.id);
                item.location_name = item
                    .location
                    .map(|id| translations.location_or_raw(game_of(&item.source), id));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Deferral
    // -----------------------------------------------------------------------

    /// Queues `entry` while the slot table is missing. Once it is known,
    /// a packet that still cannot be placed never will be, so it is
    /// reported and dropped.
    fn defer(&mut self, entry: Deferred, cause: ReconcileError) {
        let waiting = matches!(cause, ReconcileError::NotConnected { .. });
        self.diagnostics.report(cause);
        if !waiting {
            tracing::trace!(cmd = entry.cmd(), "dropping packet with no game to hold it");
            return;
        }
        if self.deferred.len() >= DEFERRED_CAPACITY {
            self.diagnostics.report(ReconcileError::DeferredQueueFull {
                cmd: entry.cmd(),
                capacity: DEFERRED_CAPACITY,
            });
            return;
        }
        self.deferred.push_back(entry);
    }

    fn replay_deferred(&mut self) {
        let pending = std::mem::take(&mut self.deferred);
        if pending.is_empty() {
            return;
        }
        tracing::debug!(count = pending.len(), "replaying deferred packets");

        for entry in pending {
            let result = match &entry {
                Deferred::Items(packet) => self.try_items(packet),
                Deferred::Scouts(info) => self.try_scouts(info),
                Deferred::Locations { checked, missing } => self.try_locations(
                    checked.as_deref().unwrap_or_default(),
                    missing.as_deref().unwrap_or_default(),
                ),
                Deferred::Hint(print) => self.try_hint(print),
            };
            if let Err(cause) = result {
                self.defer(entry, cause);
            }
        }
    }
}

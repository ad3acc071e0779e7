//! Shared protocol types: identifiers and the small objects that appear
//! inside many packets.
//!
//! Everything here travels on the wire, so the serde attributes are part
//! of the contract. Identifier newtypes are `#[serde(transparent)]`: a
//! `SlotId(2)` is just `2` in JSON, and `"2"` when used as a map key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's position in the multiworld. Slot 0 is the server itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// An item identifier, scoped to one game's item namespace.
///
/// Displays as the bare number, which is also the fallback name for an
/// item the translation tables do not know yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A location identifier, scoped to one game's location namespace.
///
/// Negative values are server-side pseudo locations (`-1` cheat console,
/// `-2` starting inventory).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct LocationId(pub i64);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// A `{major, minor, build, class}` version triple.
///
/// `class` is a discriminator the server checks verbatim; it is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub class: String,
}

impl NetworkVersion {
    /// The version announced when the server has not advertised one.
    pub fn client_default() -> Self {
        Self {
            major: 0,
            minor: 4,
            build: 6,
            class: "Version".to_string(),
        }
    }
}

impl fmt::Display for NetworkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

// ---------------------------------------------------------------------------
// Bit sets and small enums
// ---------------------------------------------------------------------------

/// Which item deliveries the client wants (the `items_handling` field of
/// `Connect`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemsHandling(pub u8);

impl ItemsHandling {
    /// Items found in other worlds.
    pub const REMOTE: Self = Self(0b001);
    /// Items found in the client's own world.
    pub const OWN_WORLD: Self = Self(0b010);
    /// The starting inventory.
    pub const STARTING_INVENTORY: Self = Self(0b100);
    /// Every delivery class.
    pub const ALL: Self = Self(0b111);
}

/// Classification bits carried on every [`NetworkItem`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemFlags(pub u8);

impl ItemFlags {
    pub const PROGRESSION: u8 = 0b001;
    pub const USEFUL: u8 = 0b010;
    pub const TRAP: u8 = 0b100;

    pub fn is_progression(self) -> bool {
        self.0 & Self::PROGRESSION != 0
    }

    pub fn is_useful(self) -> bool {
        self.0 & Self::USEFUL != 0
    }

    pub fn is_trap(self) -> bool {
        self.0 & Self::TRAP != 0
    }
}

/// A client's reported game status (`StatusUpdate.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientStatus(pub u8);

impl ClientStatus {
    pub const UNKNOWN: Self = Self(0);
    pub const CONNECTED: Self = Self(5);
    pub const READY: Self = Self(10);
    pub const PLAYING: Self = Self(20);
    pub const GOAL: Self = Self(30);
}

/// What kind of slot an entry in `slot_info` describes.
///
/// Unrecognised numbers are preserved in [`SlotType::Other`] so a newer
/// server does not break decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SlotType {
    Spectator,
    Player,
    /// An aggregate of other slots (item links), never a playable game.
    Group,
    Other(u8),
}

impl SlotType {
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

impl From<u8> for SlotType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Spectator,
            1 => Self::Player,
            2 => Self::Group,
            other => Self::Other(other),
        }
    }
}

impl From<SlotType> for u8 {
    fn from(value: SlotType) -> Self {
        match value {
            SlotType::Spectator => 0,
            SlotType::Player => 1,
            SlotType::Group => 2,
            SlotType::Other(other) => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Network objects
// ---------------------------------------------------------------------------

/// One player in the room's player list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPlayer {
    pub team: u32,
    pub slot: SlotId,
    pub alias: String,
    pub name: String,
}

/// Static description of a slot, from `Connected.slot_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSlot {
    pub name: String,
    pub game: String,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(default)]
    pub group_members: Vec<SlotId>,
}

/// An item placed at a location.
///
/// The meaning of `player` depends on the packet: in `ReceivedItems` it
/// is the slot whose world the item was found in; in `LocationInfo` it
/// is the slot the item belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkItem {
    pub item: ItemId,
    pub location: LocationId,
    pub player: SlotId,
    #[serde(default)]
    pub flags: ItemFlags,
}

/// One segment of a `PrintJSON` message.
///
/// For `player_id`, `item_id` and `location_id` parts, `text` holds the
/// numeric identifier and `player` the slot whose namespace it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JsonMessagePart {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<SlotId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<ItemFlags>,
}

/// One operation of a `Set` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStorageOperation {
    pub operation: String,
    pub value: serde_json::Value,
}

/// Translation tables for one game.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameData {
    pub item_name_to_id: BTreeMap<String, ItemId>,
    pub location_name_to_id: BTreeMap<String, LocationId>,
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// The `data` object of a `DataPackage` packet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataPackageObject {
    pub games: BTreeMap<String, GameData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

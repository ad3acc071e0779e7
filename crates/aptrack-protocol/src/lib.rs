//! Wire protocol for aptrack.
//!
//! This crate defines what an Archipelago server and its clients say to
//! each other:
//!
//! - **Packets** ([`ClientPacket`], [`ServerPacket`]) and the shared
//!   objects inside them ([`NetworkItem`], [`NetworkPlayer`], ...).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): packets to and from the
//!   text of one frame.
//! - **Errors** ([`ProtocolError`]).
//!
//! It knows nothing about sockets or sessions.
//!
//! ```text
//! Transport (text frames) → Protocol (packets) → Client (events)
//! ```

mod codec;
mod error;
pub mod packets;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use packets::{
    Bounce, Bounced, ClientPacket, Connect, Connected, ConnectionRefused,
    DataPackage, Get, GetDataPackage, InvalidPacket, LocationChecks,
    LocationInfo, LocationScouts, PrintJson, ReceivedItems, Retrieved,
    RoomInfo, RoomUpdate, SERVER_COMMANDS, Say, ServerPacket, Set,
    SetNotify, SetReply, StatusUpdate, UnknownPacket,
};
pub use types::{
    ClientStatus, DataPackageObject, DataStorageOperation, GameData,
    ItemFlags, ItemId, ItemsHandling, JsonMessagePart, LocationId,
    NetworkItem, NetworkPlayer, NetworkSlot, NetworkVersion, SlotId,
    SlotType,
};

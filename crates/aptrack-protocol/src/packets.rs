//! The packet vocabulary, one struct per packet kind.
//!
//! Both directions are internally tagged on `cmd`:
//!
//! ```text
//! { "cmd": "ReceivedItems", "index": 0, "items": [ ... ] }
//! ```
//!
//! Outbound optional fields are skipped when `None` rather than sent as
//! `null`. The one exception is [`Connect::password`], which the server
//! expects to see as `null` when there is no password.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::types::{
    ClientStatus, DataPackageObject, DataStorageOperation, ItemsHandling,
    JsonMessagePart, LocationId, NetworkItem, NetworkPlayer, NetworkSlot,
    NetworkVersion, SlotId,
};

// ===========================================================================
// Client → Server
// ===========================================================================

/// Authenticates against a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connect {
    /// Always serialized; `None` becomes `null`.
    pub password: Option<String>,
    /// Empty for trackers and other non-game clients.
    pub game: String,
    pub name: String,
    pub uuid: String,
    pub version: NetworkVersion,
    pub items_handling: ItemsHandling,
    pub tags: Vec<String>,
    pub slot_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationChecks {
    pub locations: Vec<LocationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationScouts {
    pub locations: Vec<LocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_as_hint: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ClientStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Say {
    pub text: String,
}

/// Requests translation tables. `games: None` asks for every game.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GetDataPackage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounce {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<SlotId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Get {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub want_reply: Option<bool>,
    pub operations: Vec<DataStorageOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetNotify {
    pub keys: Vec<String>,
}

/// Every packet a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ClientPacket {
    Connect(Connect),
    Sync,
    LocationChecks(LocationChecks),
    LocationScouts(LocationScouts),
    StatusUpdate(StatusUpdate),
    Say(Say),
    GetDataPackage(GetDataPackage),
    Bounce(Bounce),
    Get(Get),
    Set(Set),
    SetNotify(SetNotify),
}

impl ClientPacket {
    /// The `cmd` discriminator this packet is sent with.
    pub fn cmd(&self) -> &'static str {
        match self {
            Self::Connect(_) => "Connect",
            Self::Sync => "Sync",
            Self::LocationChecks(_) => "LocationChecks",
            Self::LocationScouts(_) => "LocationScouts",
            Self::StatusUpdate(_) => "StatusUpdate",
            Self::Say(_) => "Say",
            Self::GetDataPackage(_) => "GetDataPackage",
            Self::Bounce(_) => "Bounce",
            Self::Get(_) => "Get",
            Self::Set(_) => "Set",
            Self::SetNotify(_) => "SetNotify",
        }
    }
}

// ===========================================================================
// Server → Client
// ===========================================================================

/// First packet on every connection.
///
/// Only `version` and `seed_name` are required; the rest default when a
/// server leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub version: NetworkVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_version: Option<NetworkVersion>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub password: bool,
    #[serde(default)]
    pub permissions: BTreeMap<String, u8>,
    #[serde(default)]
    pub hint_cost: u32,
    #[serde(default)]
    pub location_check_points: u32,
    #[serde(default)]
    pub games: Vec<String>,
    #[serde(default)]
    pub datapackage_checksums: HashMap<String, String>,
    pub seed_name: String,
    #[serde(default)]
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionRefused {
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Authentication succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connected {
    pub team: u32,
    pub slot: SlotId,
    pub players: Vec<NetworkPlayer>,
    pub missing_locations: Vec<LocationId>,
    pub checked_locations: Vec<LocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_data: Option<serde_json::Value>,
    #[serde(deserialize_with = "slot_keyed")]
    pub slot_info: BTreeMap<SlotId, NetworkSlot>,
    #[serde(default)]
    pub hint_points: u32,
}

/// `slot_info` keys are slot numbers written as JSON strings. Content
/// buffered for the `cmd` tag cannot parse those into integers itself.
fn slot_keyed<'de, D>(deserializer: D) -> Result<BTreeMap<SlotId, NetworkSlot>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, NetworkSlot>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, slot)| match key.trim().parse::<u32>() {
            Ok(number) => Ok((SlotId(number), slot)),
            Err(_) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&key),
                &"a slot number",
            )),
        })
        .collect()
}

/// Items delivered to the connected slot, starting at `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedItems {
    pub index: u32,
    pub items: Vec<NetworkItem>,
}

/// Results of a `LocationScouts` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub locations: Vec<NetworkItem>,
}

/// A partial update; every field is independently optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_locations: Option<Vec<LocationId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_locations: Option<Vec<LocationId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<NetworkPlayer>>,
}

/// A chat / server message made of typed parts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrintJson {
    pub data: Vec<JsonMessagePart>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiving: Option<SlotId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<NetworkItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<bool>,
}

impl PrintJson {
    /// The message with every part's `text` concatenated, unresolved.
    pub fn plain_text(&self) -> String {
        self.data
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPackage {
    pub data: DataPackageObject,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounced {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<SlotId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidPacket {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_cmd: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieved {
    pub keys: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetReply {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub original_value: serde_json::Value,
}

/// A packet whose `cmd` this crate does not know, kept whole.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownPacket {
    pub cmd: String,
    pub body: serde_json::Value,
}

/// Every packet a server may send.
///
/// [`ServerPacket::Unknown`] is never produced by serde; the codec
/// builds it for discriminators outside [`SERVER_COMMANDS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ServerPacket {
    RoomInfo(RoomInfo),
    ConnectionRefused(ConnectionRefused),
    Connected(Connected),
    ReceivedItems(ReceivedItems),
    LocationInfo(LocationInfo),
    RoomUpdate(RoomUpdate),
    #[serde(rename = "PrintJSON")]
    PrintJson(PrintJson),
    DataPackage(DataPackage),
    Bounced(Bounced),
    InvalidPacket(InvalidPacket),
    Retrieved(Retrieved),
    SetReply(SetReply),
    #[serde(skip)]
    Unknown(UnknownPacket),
}

/// The `cmd` values [`ServerPacket`] decodes.
pub const SERVER_COMMANDS: [&str; 12] = [
    "RoomInfo",
    "ConnectionRefused",
    "Connected",
    "ReceivedItems",
    "LocationInfo",
    "RoomUpdate",
    "PrintJSON",
    "DataPackage",
    "Bounced",
    "InvalidPacket",
    "Retrieved",
    "SetReply",
];

impl ServerPacket {
    /// The `cmd` discriminator this packet arrived with.
    pub fn cmd(&self) -> &str {
        match self {
            Self::RoomInfo(_) => "RoomInfo",
            Self::ConnectionRefused(_) => "ConnectionRefused",
            Self::Connected(_) => "Connected",
            Self::ReceivedItems(_) => "ReceivedItems",
            Self::LocationInfo(_) => "LocationInfo",
            Self::RoomUpdate(_) => "RoomUpdate",
            Self::PrintJson(_) => "PrintJSON",
            Self::DataPackage(_) => "DataPackage",
            Self::Bounced(_) => "Bounced",
            Self::InvalidPacket(_) => "InvalidPacket",
            Self::Retrieved(_) => "Retrieved",
            Self::SetReply(_) => "SetReply",
            Self::Unknown(unknown) => &unknown.cmd,
        }
    }
}

#[cfg(test)]
mod tests {
    //! JSON-shape tests. The server is strict about field names and
    //! about `null` versus absent, so these pin the exact output.

    use super::*;
    use crate::types::{ItemFlags, ItemId, SlotType};

    fn connect(password: Option<&str>) -> ClientPacket {
        ClientPacket::Connect(Connect {
            password: password.map(str::to_string),
            game: String::new(),
            name: "Alice".into(),
            uuid: "00000000-0000-4000-8000-000000000000".into(),
            version: NetworkVersion::client_default(),
            items_handling: ItemsHandling::ALL,
            tags: vec!["Tracker".into()],
            slot_data: true,
        })
    }

    #[test]
    fn test_connect_without_password_sends_null() {
        let json = serde_json::to_value(connect(None)).unwrap();

        assert_eq!(json["cmd"], "Connect");
        assert!(json.get("password").is_some(), "password must be present");
        assert!(json["password"].is_null());
        assert_eq!(json["items_handling"], 7);
    }

    #[test]
    fn test_get_data_package_without_games_omits_field() {
        let packet = ClientPacket::GetDataPackage(GetDataPackage::default());
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json, serde_json::json!({ "cmd": "GetDataPackage" }));
    }

    #[test]
    fn test_get_data_package_with_games_lists_them() {
        let packet = ClientPacket::GetDataPackage(GetDataPackage {
            games: Some(vec!["Super Metroid".into()]),
        });
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["games"], serde_json::json!(["Super Metroid"]));
    }

    #[test]
    fn test_sync_is_just_the_discriminator() {
        let json = serde_json::to_value(ClientPacket::Sync).unwrap();
        assert_eq!(json, serde_json::json!({ "cmd": "Sync" }));
    }

    #[test]
    fn test_location_scouts_omits_absent_hint_flag() {
        let packet = ClientPacket::LocationScouts(LocationScouts {
            locations: vec![LocationId(1)],
            create_as_hint: None,
        });
        let json = serde_json::to_value(&packet).unwrap();
        assert!(json.get("create_as_hint").is_none());
    }

    #[test]
    fn test_connected_decodes_string_slot_keys() {
        let json = r#"{
            "cmd": "Connected",
            "team": 0,
            "slot": 1,
            "players": [{"team":0,"slot":1,"alias":"A","name":"A"}],
            "missing_locations": [10],
            "checked_locations": [],
            "slot_info": {
                "1": {"name":"A","game":"Zelda","type":1,"group_members":[]},
                "3": {"name":"Link","game":"Zelda","type":2,"group_members":[1]}
            },
            "hint_points": 4
        }"#;
        let packet: ServerPacket = serde_json::from_str(json).unwrap();

        let ServerPacket::Connected(connected) = packet else {
            panic!("expected Connected");
        };
        assert_eq!(connected.slot, SlotId(1));
        assert_eq!(connected.slot_info.len(), 2);
        assert_eq!(
            connected.slot_info[&SlotId(3)].slot_type,
            SlotType::Group
        );
        assert!(connected.slot_data.is_none());
    }

    #[test]
    fn test_room_update_absent_fields_stay_none() {
        let json = r#"{"cmd":"RoomUpdate","hint_points":12}"#;
        let packet: ServerPacket = serde_json::from_str(json).unwrap();

        let ServerPacket::RoomUpdate(update) = packet else {
            panic!("expected RoomUpdate");
        };
        assert_eq!(update.hint_points, Some(12));
        assert!(update.checked_locations.is_none());
        assert!(update.missing_locations.is_none());
        assert!(update.players.is_none());
    }

    #[test]
    fn test_print_json_uses_upper_case_tag() {
        let packet = ServerPacket::PrintJson(PrintJson {
            data: vec![JsonMessagePart {
                text: Some("hello".into()),
                ..JsonMessagePart::default()
            }],
            kind: Some("Chat".into()),
            ..PrintJson::default()
        });
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["cmd"], "PrintJSON");
        assert_eq!(json["type"], "Chat");
    }

    #[test]
    fn test_print_json_plain_text_concatenates_parts() {
        let packet = PrintJson {
            data: vec![
                JsonMessagePart {
                    text: Some("[Hint]: ".into()),
                    ..JsonMessagePart::default()
                },
                JsonMessagePart {
                    kind: Some("item_id".into()),
                    text: Some("42".into()),
                    player: Some(SlotId(1)),
                    flags: Some(ItemFlags(1)),
                    ..JsonMessagePart::default()
                },
            ],
            ..PrintJson::default()
        };
        assert_eq!(packet.plain_text(), "[Hint]: 42");
    }

    #[test]
    fn test_received_items_requires_index() {
        let json = r#"{"cmd":"ReceivedItems","items":[]}"#;
        assert!(serde_json::from_str::<ServerPacket>(json).is_err());
    }

    #[test]
    fn test_received_items_decodes_network_items() {
        let json = r#"{"cmd":"ReceivedItems","index":3,
            "items":[{"item":5,"location":6,"player":2,"flags":2}]}"#;
        let packet: ServerPacket = serde_json::from_str(json).unwrap();

        let ServerPacket::ReceivedItems(received) = packet else {
            panic!("expected ReceivedItems");
        };
        assert_eq!(received.index, 3);
        assert_eq!(received.items[0].item, ItemId(5));
        assert!(received.items[0].flags.is_useful());
    }

    #[test]
    fn test_server_commands_cover_every_decodable_variant() {
        for cmd in SERVER_COMMANDS {
            // An empty body fails on missing fields, never on the tag.
            let json = format!(r#"{{"cmd":"{cmd}"}}"#);
            if let Err(e) = serde_json::from_str::<ServerPacket>(&json) {
                assert!(
                    !e.to_string().contains("unknown variant"),
                    "{cmd} should be a known variant: {e}"
                );
            }
        }
    }
}

//! Integration tests for `ProtocolClient` over the scripted mock transport.

use std::sync::{Arc, Mutex};

use aptrack_client::{ClientEvent, EventKind, ProtocolClient};
use aptrack_protocol::{ItemsHandling, LocationId, NetworkVersion, SlotId};
use aptrack_transport::mock::MockConnector;
use serde_json::{Value, json};

const ROOM_INFO: &str = r#"[{
    "cmd": "RoomInfo",
    "version": {"major": 0, "minor": 5, "build": 1, "class": "Version"},
    "tags": ["AP"],
    "password": false,
    "games": ["Zelda", "Metroid"],
    "datapackage_checksums": {"Zelda": "z1", "Metroid": "m1"},
    "seed_name": "abc",
    "time": 1700000000.0
}]"#;

const CONNECTED: &str = r#"[{
    "cmd": "Connected",
    "team": 0,
    "slot": 1,
    "players": [
        {"team": 0, "slot": 1, "alias": "Al", "name": "Alice"},
        {"team": 0, "slot": 2, "alias": "Bo", "name": "Bob"}
    ],
    "missing_locations": [],
    "checked_locations": [],
    "slot_info": {
        "1": {"name": "Alice", "game": "Zelda", "type": 1, "group_members": []},
        "2": {"name": "Bob", "game": "Metroid", "type": 1, "group_members": []}
    },
    "hint_points": 0
}]"#;

async fn open_client() -> (ProtocolClient<MockConnector>, MockConnector) {
    let remote = MockConnector::new();
    let mut client = ProtocolClient::new(remote.clone(), "ws://mock:38281");
    client.connect().await.expect("mock connect should succeed");
    client.drain_events();
    (client, remote)
}

/// Parses the `n`th sent frame and returns its only packet.
fn sent_packet(remote: &MockConnector, n: usize) -> Value {
    let frames = remote.sent();
    let frame: Value = serde_json::from_str(&frames[n]).expect("sent frame is JSON");
    let packets = frame.as_array().expect("sent frame is an array");
    assert_eq!(packets.len(), 1, "one packet per send");
    packets[0].clone()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_emits_opened_once() {
    let remote = MockConnector::new();
    let mut client = ProtocolClient::new(remote.clone(), "ws://mock");

    client.connect().await.unwrap();
    client.connect().await.unwrap();

    assert_eq!(remote.connect_count(), 1, "second connect is a no-op");
    let events = client.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ClientEvent::Opened));
    assert!(client.is_open());
}

#[tokio::test]
async fn test_connect_failure_returns_error_and_emits_event() {
    let remote = MockConnector::new();
    remote.fail_next_connect("refused");
    let mut client = ProtocolClient::new(remote, "ws://mock");

    assert!(client.connect().await.is_err());
    assert!(!client.is_open());

    let events = client.drain_events();
    assert!(matches!(&events[..], [ClientEvent::Error { .. }]));
}

#[tokio::test]
async fn test_remote_close_emits_disconnected_and_clears_caches() {
    let (mut client, remote) = open_client().await;
    remote.push_text(ROOM_INFO);
    remote.push_text(CONNECTED);
    remote.push_close(4000, "room closed");

    assert!(client.next_frame().await);
    assert!(client.next_frame().await);
    assert!(client.server_version().is_some());
    assert_eq!(client.slot_info().len(), 2);

    assert!(!client.next_frame().await, "close ends the connection");
    assert!(!client.is_open());
    assert!(client.server_version().is_none());
    assert!(client.slot_info().is_empty());
    assert!(client.players().is_empty());

    let last = client.drain_events().pop().unwrap();
    match last {
        ClientEvent::Disconnected { code, reason, local } => {
            assert_eq!(code, 4000);
            assert_eq!(reason, "room closed");
            assert!(!local);
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_closes_transport_and_reports_local() {
    let (mut client, remote) = open_client().await;

    client.disconnect().await;

    assert!(remote.is_closed());
    assert!(!client.is_open());
    let events = client.drain_events();
    assert!(matches!(
        &events[..],
        [ClientEvent::Disconnected { local: true, .. }]
    ));
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_authenticate_before_room_info_uses_default_version() {
    let (mut client, remote) = open_client().await;

    client.authenticate("Alice", None).await;

    let packet = sent_packet(&remote, 0);
    assert_eq!(packet["cmd"], "Connect");
    assert_eq!(packet["version"]["build"], 6);
    assert_eq!(packet["version"]["class"], "Version");
    assert!(packet["password"].is_null());
}

#[tokio::test]
async fn test_authenticate_empty_password_sends_null() {
    let (mut client, remote) = open_client().await;

    client.authenticate("Alice", Some("")).await;

    let packet = sent_packet(&remote, 0);
    assert!(packet["password"].is_null(), "got {}", packet["password"]);
}

#[tokio::test]
async fn test_authenticate_round_trips_name_password_and_flags() {
    let (mut client, remote) = open_client().await;
    remote.push_text(ROOM_INFO);
    client.next_frame().await;

    client.authenticate("Alice", Some("hunter2")).await;

    let packet = sent_packet(&remote, 0);
    assert_eq!(packet["name"], "Alice");
    assert_eq!(packet["password"], "hunter2");
    assert_eq!(packet["items_handling"], ItemsHandling::ALL.0);
    assert_eq!(packet["tags"], json!(["Tracker", "WebTracker"]));
    assert_eq!(packet["game"], "");
    assert_eq!(packet["slot_data"], true);
    assert_eq!(packet["uuid"], client.uuid());

    // The server's advertised version, not the default.
    let version: NetworkVersion =
        serde_json::from_value(packet["version"].clone()).unwrap();
    assert_eq!(version.to_string(), "0.5.1");
}

#[tokio::test]
async fn test_request_data_package_scoped_and_unscoped() {
    let (mut client, remote) = open_client().await;

    client.request_data_package(None).await;
    client
        .request_data_package(Some(vec!["Zelda".to_string()]))
        .await;

    assert_eq!(sent_packet(&remote, 0), json!({"cmd": "GetDataPackage"}));
    assert_eq!(
        sent_packet(&remote, 1),
        json!({"cmd": "GetDataPackage", "games": ["Zelda"]})
    );
}

#[tokio::test]
async fn test_convenience_senders_build_expected_packets() {
    let (mut client, remote) = open_client().await;

    client.sync().await;
    client.say("hello").await;
    client.check_locations(vec![LocationId(7)]).await;
    client.scout_locations(vec![LocationId(8)]).await;

    assert_eq!(sent_packet(&remote, 0), json!({"cmd": "Sync"}));
    assert_eq!(sent_packet(&remote, 1), json!({"cmd": "Say", "text": "hello"}));
    assert_eq!(
        sent_packet(&remote, 2),
        json!({"cmd": "LocationChecks", "locations": [7]})
    );
    assert_eq!(
        sent_packet(&remote, 3),
        json!({"cmd": "LocationScouts", "locations": [8]})
    );
}

#[tokio::test]
async fn test_send_after_remote_close_emits_error() {
    let (mut client, remote) = open_client().await;
    remote.push_close(1000, "");
    client.next_frame().await;
    client.drain_events();

    client.sync().await;

    let events = client.drain_events();
    assert!(matches!(&events[..], [ClientEvent::Error { .. }]));
    assert!(remote.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connected_updates_tables_before_emitting() {
    let (mut client, remote) = open_client().await;
    remote.push_text(CONNECTED);

    client.next_frame().await;

    assert_eq!(client.slot_info()[&SlotId(2)].game, "Metroid");
    assert_eq!(client.players().len(), 2);
    let events = client.drain_events();
    assert!(matches!(&events[..], [ClientEvent::Connected(c)] if c.slot == SlotId(1)));
}

#[tokio::test]
async fn test_room_update_players_refresh_cache() {
    let (mut client, remote) = open_client().await;
    remote.push_text(CONNECTED);
    remote.push_text(
        r#"[{"cmd":"RoomUpdate","players":[{"team":0,"slot":1,"alias":"Ally","name":"Alice"}]}]"#,
    );

    client.next_frame().await;
    client.next_frame().await;

    assert_eq!(client.players().len(), 1);
    assert_eq!(client.players()[0].alias, "Ally");
}

#[tokio::test]
async fn test_data_package_merges_games_across_packets() {
    let (mut client, remote) = open_client().await;
    remote.push_text(
        r#"[{"cmd":"DataPackage","data":{"games":{"Zelda":{
            "item_name_to_id":{"Sword":1},"location_name_to_id":{"Cave":10},
            "version":1,"checksum":"z1"}}}}]"#,
    );
    remote.push_text(
        r#"[{"cmd":"DataPackage","data":{"games":{"Metroid":{
            "item_name_to_id":{"Missile":2},"location_name_to_id":{"Brinstar":20},
            "checksum":"m1"}}}}]"#,
    );

    client.next_frame().await;
    client.next_frame().await;

    let games = &client.data_package().games;
    assert_eq!(games.len(), 2);
    assert_eq!(games["Zelda"].checksum.as_deref(), Some("z1"));
    assert!(games.contains_key("Metroid"));
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_and_next_frame_processed() {
    let (mut client, remote) = open_client().await;
    remote.push_text(r#"{"cmd":"RoomInfo"}"#);
    remote.push_text("not json at all");
    remote.push_text(r#"[{"cmd":"RoomUpdate","hint_points":3}]"#);

    assert!(client.next_frame().await);
    assert!(client.next_frame().await);
    assert!(client.next_frame().await);

    let events = client.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ClientEvent::RoomUpdate(u) if u.hint_points == Some(3)));
}

#[tokio::test]
async fn test_bad_element_does_not_drop_its_siblings() {
    let (mut client, remote) = open_client().await;
    remote.push_text(
        r#"[{"cmd":"ReceivedItems","items":[]},{"cmd":"RoomUpdate","hint_points":1}]"#,
    );

    client.next_frame().await;

    let events = client.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::RoomUpdate);
}

#[tokio::test]
async fn test_administrative_and_unknown_packets_emit_nothing() {
    let (mut client, remote) = open_client().await;
    remote.push_text(
        r#"[
            {"cmd":"Bounced","data":{}},
            {"cmd":"InvalidPacket","type":"cmd","text":"bad"},
            {"cmd":"SetReply","key":"k","value":1},
            {"cmd":"Mystery","x":1}
        ]"#,
    );

    client.next_frame().await;

    assert!(client.drain_events().is_empty());
}

#[tokio::test]
async fn test_print_json_is_emitted_for_hint_reconciliation() {
    let (mut client, remote) = open_client().await;
    remote.push_text(r#"[{"cmd":"PrintJSON","type":"Chat","data":[{"text":"gg"}]}]"#);

    client.next_frame().await;

    let events = client.drain_events();
    assert!(matches!(&events[..], [ClientEvent::PrintJson(p)] if p.plain_text() == "gg"));
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_observers_run_in_registration_order() {
    let (mut client, remote) = open_client().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second"] {
        let log = Arc::clone(&log);
        client.subscribe(EventKind::RoomInfo, move |event| {
            if let ClientEvent::RoomInfo(info) = event {
                log.lock().unwrap().push(format!("{tag}:{}", info.seed_name));
            }
        });
    }
    remote.push_text(ROOM_INFO);

    client.next_frame().await;

    assert_eq!(*log.lock().unwrap(), vec!["first:abc", "second:abc"]);
}

#[tokio::test]
async fn test_unsubscribe_stops_only_that_observer() {
    let (mut client, remote) = open_client().await;
    let count = Arc::new(Mutex::new((0, 0)));

    let a = {
        let count = Arc::clone(&count);
        client.subscribe(EventKind::RoomUpdate, move |_| count.lock().unwrap().0 += 1)
    };
    {
        let count = Arc::clone(&count);
        client.subscribe(EventKind::RoomUpdate, move |_| count.lock().unwrap().1 += 1);
    }

    remote.push_text(r#"[{"cmd":"RoomUpdate"}]"#);
    client.next_frame().await;
    assert!(client.unsubscribe(a));
    remote.push_text(r#"[{"cmd":"RoomUpdate"}]"#);
    client.next_frame().await;

    assert_eq!(*count.lock().unwrap(), (1, 2));
}

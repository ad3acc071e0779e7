//! The protocol client: one logical connection to one server.
//!
//! # Flow
//!
//! ```text
//! connect() ──→ Opened
//!                  │
//! next_frame() ──→ decode ──→ update caches ──→ notify observers ──→ queue
//!                  │
//!            Closed / recv error ──→ Disconnected
//! ```
//!
//! The client never reconnects on its own and never processes two frames
//! at once: [`ProtocolClient::next_frame`] awaits one frame, dispatches
//! every packet in it, and returns.

use std::collections::{BTreeMap, VecDeque};

use aptrack_protocol::{
    ClientPacket, ClientStatus, Codec, Connect, DataPackageObject,
    GetDataPackage, ItemsHandling, JsonCodec, LocationChecks, LocationId,
    LocationScouts, NetworkPlayer, NetworkSlot, NetworkVersion, Say,
    ServerPacket, SlotId, StatusUpdate,
};
use aptrack_transport::{
    CloseReason, Connection, Connector, NORMAL_CLOSURE, Received,
};
use uuid::Uuid;

use crate::observer::Observers;
use crate::{ClientError, ClientEvent, EventKind, SubscriptionId};

/// Tags that mark this connection as a passive tracker.
pub const TRACKER_TAGS: [&str; 2] = ["Tracker", "WebTracker"];

/// A connection to one Archipelago endpoint.
///
/// Holds only per-connection state: the socket, the last advertised
/// server version, and the slot, player and data-package tables. All of
/// it is dropped by [`disconnect`](Self::disconnect) and on remote close.
///
/// Every emitted [`ClientEvent`] goes to the matching observers first and
/// is then queued until [`drain_events`](Self::drain_events) is called.
pub struct ProtocolClient<C: Connector> {
    connector: C,
    url: String,
    uuid: String,
    codec: JsonCodec,
    connection: Option<C::Connection>,
    server_version: Option<NetworkVersion>,
    slot_info: BTreeMap<SlotId, NetworkSlot>,
    players: Vec<NetworkPlayer>,
    data_package: DataPackageObject,
    observers: Observers,
    queue: VecDeque<ClientEvent>,
}

impl<C: Connector> ProtocolClient<C> {
    /// Creates a client for `url`. Nothing is opened until
    /// [`connect`](Self::connect).
    pub fn new(connector: C, url: impl Into<String>) -> Self {
        Self {
            connector,
            url: url.into(),
            uuid: Uuid::new_v4().to_string(),
            codec: JsonCodec,
            connection: None,
            server_version: None,
            slot_info: BTreeMap::new(),
            players: Vec::new(),
            data_package: DataPackageObject::default(),
            observers: Observers::default(),
            queue: VecDeque::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The UUID announced in `Connect`, fixed for this client's lifetime.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Version from the most recent `RoomInfo`, if any.
    pub fn server_version(&self) -> Option<&NetworkVersion> {
        self.server_version.as_ref()
    }

    pub fn slot_info(&self) -> &BTreeMap<SlotId, NetworkSlot> {
        &self.slot_info
    }

    pub fn players(&self) -> &[NetworkPlayer] {
        &self.players
    }

    /// Every game received so far on this connection, merged.
    pub fn data_package(&self) -> &DataPackageObject {
        &self.data_package
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Registers `callback` for events of `kind`. Observers of one kind run
    /// in registration order.
    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: FnMut(&ClientEvent) + Send + 'static,
    {
        self.observers.subscribe(kind, Box::new(callback))
    }

    /// Removes one registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Takes every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.queue.drain(..).collect()
    }

    fn emit(&mut self, event: ClientEvent) {
        self.observers.notify(&event);
        self.queue.push_back(event);
    }

    fn report(&mut self, err: &ClientError) {
        self.emit(ClientEvent::Error {
            message: err.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Opens the transport and emits [`ClientEvent::Opened`].
    ///
    /// Calling this while already open logs a warning and does nothing.
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] if the connection cannot be
    /// established. The failure is also emitted as an error event.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.is_open() {
            tracing::warn!(url = %self.url, "connect called while already open");
            return Ok(());
        }

        match self.connector.connect(&self.url).await {
            Ok(connection) => {
                tracing::info!(url = %self.url, conn = %connection.id(), "transport open");
                self.connection = Some(connection);
                self.emit(ClientEvent::Opened);
                Ok(())
            }
            Err(e) => {
                let err = ClientError::from(e);
                tracing::error!(url = %self.url, error = %err, "connect failed");
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Closes the transport, clears the per-connection caches and emits
    /// a local [`ClientEvent::Disconnected`]. A no-op when not open.
    pub async fn disconnect(&mut self) {
        let Some(connection) = self.connection.take() else {
            tracing::debug!("disconnect called while not open");
            return;
        };
        if let Err(e) = connection.close().await {
            tracing::debug!(error = %e, "close failed, dropping connection");
        }
        tracing::info!(conn = %connection.id(), "disconnected by client");
        self.reset();
        self.emit(ClientEvent::Disconnected {
            code: NORMAL_CLOSURE,
            reason: "closed by client".to_string(),
            local: true,
        });
    }

    fn reset(&mut self) {
        self.server_version = None;
        self.slot_info.clear();
        self.players.clear();
        self.data_package = DataPackageObject::default();
    }

    fn closed_remotely(&mut self, close: CloseReason) {
        self.connection = None;
        self.reset();
        self.emit(ClientEvent::Disconnected {
            code: close.code,
            reason: close.reason,
            local: false,
        });
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Sends one packet. Failures are logged and emitted as
    /// [`ClientEvent::Error`], never returned.
    pub async fn send(&mut self, packet: ClientPacket) {
        if let Err(err) = self.try_send(&packet).await {
            tracing::warn!(cmd = packet.cmd(), error = %err, "send failed");
            self.report(&err);
        }
    }

    async fn try_send(&self, packet: &ClientPacket) -> Result<(), ClientError> {
        let connection = self
            .connection
            .as_ref()
            .ok_or(ClientError::NotConnected { cmd: packet.cmd() })?;
        let frame = self.codec.encode(packet)?;
        connection.send(&frame).await?;
        tracing::debug!(cmd = packet.cmd(), "sent");
        Ok(())
    }

    /// Sends `Connect` for `slot_name` as a passive tracker.
    ///
    /// Uses the version from the last `RoomInfo`, or
    /// [`NetworkVersion::client_default`] if none has arrived. An empty
    /// password is sent as `null`.
    pub async fn authenticate(&mut self, slot_name: &str, password: Option<&str>) {
        let version = self
            .server_version
            .clone()
            .unwrap_or_else(NetworkVersion::client_default);
        let packet = ClientPacket::Connect(Connect {
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
            game: String::new(),
            name: slot_name.to_string(),
            uuid: self.uuid.clone(),
            version,
            items_handling: ItemsHandling::ALL,
            tags: TRACKER_TAGS.iter().map(|t| t.to_string()).collect(),
            slot_data: true,
        });
        self.send(packet).await;
    }

    /// Requests translation tables for `games`, or for every game when
    /// `None`.
    pub async fn request_data_package(&mut self, games: Option<Vec<String>>) {
        self.send(ClientPacket::GetDataPackage(GetDataPackage { games }))
            .await;
    }

    pub async fn sync(&mut self) {
        self.send(ClientPacket::Sync).await;
    }

    pub async fn say(&mut self, text: impl Into<String>) {
        self.send(ClientPacket::Say(Say { text: text.into() })).await;
    }

    pub async fn check_locations(&mut self, locations: Vec<LocationId>) {
        self.send(ClientPacket::LocationChecks(LocationChecks { locations }))
            .await;
    }

    pub async fn scout_locations(&mut self, locations: Vec<LocationId>) {
        self.send(ClientPacket::LocationScouts(LocationScouts {
            locations,
            create_as_hint: None,
        }))
        .await;
    }

    pub async fn status_update(&mut self, status: ClientStatus) {
        self.send(ClientPacket::StatusUpdate(StatusUpdate { status }))
            .await;
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Awaits one inbound frame and dispatches every packet in it.
    ///
    /// Returns `false` once the connection is closed (or was never
    /// opened); `true` means more frames may follow.
    pub async fn next_frame(&mut self) -> bool {
        let Some(connection) = self.connection.as_ref() else {
            return false;
        };

        match connection.recv().await {
            Ok(Received::Text(text)) => {
                self.dispatch_frame(&text);
                true
            }
            Ok(Received::Closed(close)) => {
                tracing::info!(%close, "connection closed by server");
                self.closed_remotely(close);
                false
            }
            Err(e) => {
                let err = ClientError::from(e);
                tracing::error!(error = %err, "receive failed");
                self.report(&err);
                self.closed_remotely(CloseReason {
                    reason: err.to_string(),
                    ..CloseReason::abnormal()
                });
                false
            }
        }
    }

    fn dispatch_frame(&mut self, text: &str) {
        let packets = match self.codec.decode(text) {
            Ok(packets) => packets,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return;
            }
        };

        for packet in packets {
            match packet {
                Ok(packet) => self.dispatch(packet),
                Err(e) => tracing::warn!(error = %e, "dropping malformed packet"),
            }
        }
    }

    fn dispatch(&mut self, packet: ServerPacket) {
        tracing::debug!(cmd = packet.cmd(), "received");

        match packet {
            ServerPacket::RoomInfo(info) => {
                self.server_version = Some(info.version.clone());
                self.emit(ClientEvent::RoomInfo(info));
            }
            ServerPacket::ConnectionRefused(refused) => {
                tracing::warn!(errors = ?refused.errors, "connection refused");
                self.emit(ClientEvent::ConnectionRefused(refused));
            }
            ServerPacket::Connected(connected) => {
                self.slot_info = connected.slot_info.clone();
                self.players = connected.players.clone();
                self.emit(ClientEvent::Connected(connected));
            }
            ServerPacket::ReceivedItems(items) => {
                self.emit(ClientEvent::ReceivedItems(items));
            }
            ServerPacket::LocationInfo(info) => {
                self.emit(ClientEvent::LocationInfo(info));
            }
            ServerPacket::RoomUpdate(update) => {
                if let Some(players) = &update.players {
                    self.players = players.clone();
                }
                self.emit(ClientEvent::RoomUpdate(update));
            }
            ServerPacket::DataPackage(package) => {
                for (game, data) in &package.data.games {
                    self.data_package.games.insert(game.clone(), data.clone());
                }
                self.emit(ClientEvent::DataPackage(package));
            }
            ServerPacket::PrintJson(print) => {
                tracing::debug!(kind = ?print.kind, text = %print.plain_text(), "message");
                self.emit(ClientEvent::PrintJson(print));
            }
            ServerPacket::InvalidPacket(invalid) => {
                tracing::warn!(
                    kind = %invalid.kind,
                    original_cmd = ?invalid.original_cmd,
                    text = %invalid.text,
                    "server rejected a packet"
                );
            }
            ServerPacket::Bounced(_)
            | ServerPacket::Retrieved(_)
            | ServerPacket::SetReply(_) => {}
            ServerPacket::Unknown(unknown) => {
                tracing::debug!(cmd = %unknown.cmd, "ignoring unknown packet");
            }
        }
    }
}

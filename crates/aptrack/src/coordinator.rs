//! The connection coordinator: handshake state machine and the single
//! place where client events meet the reconciler.
//!
//! ```text
//! Disconnected ──connect()──→ Connecting ──open──→ AwaitingRoomInfo
//!                                                     │ RoomInfo → send Connect
//!                                                     ▼
//!                  Error ←──ConnectionRefused── Authenticating
//!                                                     │ Connected → GetDataPackage
//!                                                     ▼
//!                  Connected ←──DataPackage── AwaitingDataPackage
//! ```
//!
//! Any remote close or transport failure moves to `Error`; a local
//! `disconnect()` moves to `Disconnected`. Nothing is retried.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use aptrack_client::{ClientEvent, ProtocolClient};
use aptrack_protocol::SlotId;
use aptrack_session::{Reconciler, Session};
use aptrack_transport::Connector;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{AptrackError, ConnectionSettings, SettingsProvider};

/// Where the coordinator is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    AwaitingRoomInfo,
    Authenticating,
    AwaitingDataPackage,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// Whether a transport is (or is about to be) open.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Error)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingRoomInfo => "awaiting room info",
            Self::Authenticating => "authenticating",
            Self::AwaitingDataPackage => "awaiting data package",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// What the data-package request after `Connected` should ask for.
#[derive(Debug, PartialEq, Eq)]
enum PackageRequest {
    All,
    Games(Vec<String>),
    Cached,
}

/// Builder for a [`Coordinator`].
pub struct CoordinatorBuilder<P> {
    settings: P,
    session_id: Option<String>,
}

impl<P: SettingsProvider> CoordinatorBuilder<P> {
    pub fn new(settings: P) -> Self {
        Self {
            settings,
            session_id: None,
        }
    }

    /// Fixes the session identifier instead of generating a UUID.
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn build<C: Connector + Clone>(self, connector: C) -> Coordinator<C, P> {
        let session_id = self
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let reconciler = Reconciler::new(session_id);
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (session_tx, _) = watch::channel(Arc::new(reconciler.session().clone()));

        Coordinator {
            connector,
            provider: self.settings,
            client: None,
            active: None,
            reconciler,
            status: ConnectionStatus::Disconnected,
            room_name: None,
            connected_slot: None,
            last_connected_at: None,
            error_message: None,
            room_games: Vec::new(),
            room_checksums: HashMap::new(),
            status_tx,
            session_tx,
        }
    }
}

/// Drives one tracker connection at a time and owns the reconciled
/// session across connections.
///
/// A fresh [`ProtocolClient`] is created for every `connect()`, so
/// per-connection caches never leak between attempts. The reconciler
/// and its translation cache live as long as the coordinator.
pub struct Coordinator<C: Connector + Clone, P: SettingsProvider = ConnectionSettings> {
    connector: C,
    provider: P,
    client: Option<ProtocolClient<C>>,
    /// Settings read at the start of the current attempt.
    active: Option<ConnectionSettings>,
    reconciler: Reconciler,
    status: ConnectionStatus,
    room_name: Option<String>,
    connected_slot: Option<SlotId>,
    last_connected_at: Option<SystemTime>,
    error_message: Option<String>,
    room_games: Vec<String>,
    room_checksums: HashMap<String, String>,
    status_tx: watch::Sender<ConnectionStatus>,
    session_tx: watch::Sender<Arc<Session>>,
}

impl<C: Connector + Clone, P: SettingsProvider> Coordinator<C, P> {
    pub fn new(connector: C, settings: P) -> Self {
        CoordinatorBuilder::new(settings).build(connector)
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn session(&self) -> &Session {
        self.reconciler.session()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Seed name of the room, while connected to one.
    pub fn room_name(&self) -> Option<&str> {
        self.room_name.as_deref()
    }

    pub fn connected_slot(&self) -> Option<SlotId> {
        self.connected_slot
    }

    pub fn last_connected_at(&self) -> Option<SystemTime> {
        self.last_connected_at
    }

    /// The latest error, kept until [`clear_error`](Self::clear_error) or
    /// the next successful `connect()` call.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// The live protocol client, for sending extra packets.
    pub fn client_mut(&mut self) -> Option<&mut ProtocolClient<C>> {
        self.client.as_mut()
    }

    /// Status updates for readers in other tasks.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Session snapshots, republished after every processed frame that
    /// changed the session.
    pub fn watch_session(&self) -> watch::Receiver<Arc<Session>> {
        self.session_tx.subscribe()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Starts a fresh connection attempt.
    ///
    /// Does nothing (with a warning) while a connection is live.
    ///
    /// # Errors
    /// - [`AptrackError::InvalidSettings`] if the settings fail
    ///   validation. No transport is opened.
    /// - [`AptrackError::Client`] if the transport cannot be opened. The
    ///   status moves to [`ConnectionStatus::Error`].
    pub async fn connect(&mut self) -> Result<(), AptrackError> {
        if self.status.is_live() {
            tracing::warn!(status = %self.status, "connect called while a connection is live");
            return Ok(());
        }

        let settings = self.provider.settings();
        if let Err(err) = settings.validate() {
            tracing::warn!(error = %err, "not connecting");
            self.error_message = Some(err.to_string());
            self.publish();
            return Err(err);
        }

        let url = settings.url();
        tracing::info!(%url, slot = %settings.slot_name, "connecting");
        self.error_message = None;
        self.set_status(ConnectionStatus::Connecting);

        let mut client = ProtocolClient::new(self.connector.clone(), url);
        if let Err(err) = client.connect().await {
            self.fail(err.to_string());
            self.publish();
            return Err(err.into());
        }
        self.client = Some(client);
        self.active = Some(settings);

        self.pump().await;
        Ok(())
    }

    /// Closes the transport from any state and forgets the room.
    /// The reconciled session is kept.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.as_mut() {
            client.disconnect().await;
        }
        self.pump().await;

        self.drop_connection();
        self.set_status(ConnectionStatus::Disconnected);
        self.publish();
    }

    /// Processes one inbound frame. Returns `false` once there is no
    /// live connection left to read from.
    pub async fn step(&mut self) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        let open = client.next_frame().await;
        self.pump().await;

        if !open && self.client.is_some() {
            self.drop_connection();
        }
        self.client.is_some()
    }

    /// Steps until the connection ends.
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    // -----------------------------------------------------------------------
    // Event handling
    // -----------------------------------------------------------------------

    async fn pump(&mut self) {
        loop {
            let events = match self.client.as_mut() {
                Some(client) => client.drain_events(),
                None => break,
            };
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle(event).await;
            }
        }
        self.publish();
    }

    async fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Opened => {
                if self.status == ConnectionStatus::Connecting {
                    self.set_status(ConnectionStatus::AwaitingRoomInfo);
                }
            }
            ClientEvent::RoomInfo(info) => {
                self.reconciler.fold_room_info(&info);
                self.room_name = Some(info.seed_name.clone());
                self.room_games = info.games;
                self.room_checksums = info.datapackage_checksums;

                if self.status != ConnectionStatus::AwaitingRoomInfo {
                    tracing::debug!(status = %self.status, "room info outside the handshake");
                    return;
                }
                self.set_status(ConnectionStatus::Authenticating);
                if let (Some(client), Some(settings)) = (self.client.as_mut(), self.active.as_ref()) {
                    client
                        .authenticate(&settings.slot_name, settings.password.as_deref())
                        .await;
                }
            }
            ClientEvent::ConnectionRefused(refused) => {
                self.fail(format!("Connection refused: {}", refused.errors.join(", ")));
            }
            ClientEvent::Connected(connected) => {
                self.reconciler.fold_connected(&connected);
                self.connected_slot = Some(connected.slot);
                self.last_connected_at = Some(SystemTime::now());

                if self.status != ConnectionStatus::Authenticating {
                    return;
                }
                tracing::info!(slot = %connected.slot, "authenticated");
                let games = match self.package_request() {
                    PackageRequest::Cached => {
                        tracing::debug!("every game's tables are cached");
                        self.set_status(ConnectionStatus::Connected);
                        return;
                    }
                    PackageRequest::All => None,
                    PackageRequest::Games(games) => Some(games),
                };
                self.set_status(ConnectionStatus::AwaitingDataPackage);
                if let Some(client) = self.client.as_mut() {
                    client.request_data_package(games).await;
                }
            }
            ClientEvent::DataPackage(package) => {
                self.reconciler.fold_data_package(&package);
                if self.status == ConnectionStatus::AwaitingDataPackage {
                    self.set_status(ConnectionStatus::Connected);
                }
            }
            ClientEvent::ReceivedItems(items) => self.reconciler.fold_received_items(&items),
            ClientEvent::LocationInfo(info) => self.reconciler.fold_location_info(&info),
            ClientEvent::RoomUpdate(update) => self.reconciler.fold_room_update(&update),
            ClientEvent::PrintJson(print) => self.reconciler.fold_print_json(&print),
            ClientEvent::Disconnected { code, reason, local } => {
                self.drop_connection();
                if local {
                    self.set_status(ConnectionStatus::Disconnected);
                } else if self.status != ConnectionStatus::Error {
                    let message = if reason.is_empty() {
                        format!("Connection closed (code {code})")
                    } else {
                        format!("Connection closed (code {code}: {reason})")
                    };
                    self.fail(message);
                }
            }
            ClientEvent::Error { message } => {
                tracing::warn!(%message, "client error");
                self.error_message = Some(message);
            }
        }
    }

    /// Games listed in `RoomInfo` whose checksum is not already cached.
    fn package_request(&self) -> PackageRequest {
        if self.room_games.is_empty() {
            return PackageRequest::All;
        }
        let translations = self.reconciler.translations();
        let missing: Vec<String> = self
            .room_games
            .iter()
            .filter(|game| match self.room_checksums.get(*game) {
                Some(checksum) => !translations.has_checksum(game, checksum),
                None => true,
            })
            .cloned()
            .collect();

        if missing.is_empty() {
            PackageRequest::Cached
        } else {
            PackageRequest::Games(missing)
        }
    }

    // -----------------------------------------------------------------------
    // State helpers
    // -----------------------------------------------------------------------

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            tracing::info!(from = %self.status, to = %status, "connection status");
            self.status = status;
        }
    }

    fn fail(&mut self, message: String) {
        tracing::error!(%message, "connection failed");
        self.error_message = Some(message);
        self.set_status(ConnectionStatus::Error);
    }

    /// Forgets the client and every connection-scoped identifier.
    fn drop_connection(&mut self) {
        self.client = None;
        self.active = None;
        self.room_name = None;
        self.connected_slot = None;
        self.room_games.clear();
        self.room_checksums.clear();
    }

    fn publish(&self) {
        let status = self.status;
        self.status_tx.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });

        let session = self.reconciler.session();
        self.session_tx.send_if_modified(|current| {
            if **current == *session {
                return false;
            }
            *current = Arc::new(session.clone());
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use aptrack_transport::mock::MockConnector;

    use super::*;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            scheme: "ws".into(),
            host: "localhost".into(),
            port: Some(38281),
            slot_name: "Alice".into(),
            password: None,
        }
    }

    #[test]
    fn test_status_is_live() {
        assert!(!ConnectionStatus::Disconnected.is_live());
        assert!(!ConnectionStatus::Error.is_live());
        assert!(ConnectionStatus::Authenticating.is_live());
        assert!(ConnectionStatus::Connected.is_live());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            ConnectionStatus::AwaitingDataPackage.to_string(),
            "awaiting data package"
        );
    }

    #[test]
    fn test_builder_uses_given_session_id() {
        let coordinator = CoordinatorBuilder::new(settings())
            .session_id("fixed")
            .build(MockConnector::new());
        assert_eq!(coordinator.session().id, "fixed");
        assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_builder_without_session_id_generates_v4_uuid() {
        let coordinator = Coordinator::new(MockConnector::new(), settings());
        let id = Uuid::parse_str(&coordinator.session().id).unwrap();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_package_request_without_room_games_asks_for_all() {
        let coordinator = Coordinator::new(MockConnector::new(), settings());
        assert_eq!(coordinator.package_request(), PackageRequest::All);
    }

    #[test]
    fn test_package_request_lists_uncached_games() {
        let mut coordinator = Coordinator::new(MockConnector::new(), settings());
        coordinator.room_games = vec!["Zelda".into(), "Metroid".into()];
        coordinator.room_checksums = [("Zelda".to_string(), "z1".to_string())].into();

        assert_eq!(
            coordinator.package_request(),
            PackageRequest::Games(vec!["Zelda".into(), "Metroid".into()])
        );
    }
}

//! Typed notifications emitted by the protocol client.

use aptrack_protocol::{
    Connected, ConnectionRefused, DataPackage, LocationInfo, PrintJson,
    ReceivedItems, RoomInfo, RoomUpdate,
};

/// Something the client observed, already decoded.
///
/// Packets without a variant here (`Bounced`, `Retrieved`, `SetReply`,
/// `InvalidPacket`, unknown commands) are logged and not emitted.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The transport is open. Nothing has been exchanged yet.
    Opened,
    RoomInfo(RoomInfo),
    ConnectionRefused(ConnectionRefused),
    Connected(Connected),
    ReceivedItems(ReceivedItems),
    LocationInfo(LocationInfo),
    RoomUpdate(RoomUpdate),
    DataPackage(DataPackage),
    PrintJson(PrintJson),
    /// The transport is gone. `local` is true when this client closed it.
    Disconnected {
        code: u16,
        reason: String,
        local: bool,
    },
    /// A send or transport failure, already logged.
    Error { message: String },
}

/// The category of a [`ClientEvent`], used to pick observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Opened,
    RoomInfo,
    ConnectionRefused,
    Connected,
    ReceivedItems,
    LocationInfo,
    RoomUpdate,
    DataPackage,
    PrintJson,
    Disconnected,
    Error,
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Opened => EventKind::Opened,
            Self::RoomInfo(_) => EventKind::RoomInfo,
            Self::ConnectionRefused(_) => EventKind::ConnectionRefused,
            Self::Connected(_) => EventKind::Connected,
            Self::ReceivedItems(_) => EventKind::ReceivedItems,
            Self::LocationInfo(_) => EventKind::LocationInfo,
            Self::RoomUpdate(_) => EventKind::RoomUpdate,
            Self::DataPackage(_) => EventKind::DataPackage,
            Self::PrintJson(_) => EventKind::PrintJson,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let event = ClientEvent::Disconnected {
            code: 1000,
            reason: String::new(),
            local: true,
        };
        assert_eq!(event.kind(), EventKind::Disconnected);
        assert_eq!(ClientEvent::Opened.kind(), EventKind::Opened);
        assert_eq!(
            ClientEvent::RoomUpdate(RoomUpdate::default()).kind(),
            EventKind::RoomUpdate
        );
    }
}

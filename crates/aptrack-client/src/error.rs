//! Error types for the protocol client.

use aptrack_protocol::ProtocolError;
use aptrack_transport::TransportError;

/// Errors raised while talking to the server.
///
/// Only [`ProtocolClient::connect`](crate::ProtocolClient::connect)
/// returns one directly. Everywhere else the error is logged and
/// surfaced as [`ClientEvent::Error`](crate::ClientEvent::Error).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A packet was sent while no transport was open.
    #[error("cannot send {cmd}: not connected")]
    NotConnected { cmd: &'static str },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

//! Transport abstraction layer for aptrack.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how a client reaches a multiworld server. The protocol client only ever
//! sees whole text frames; framing, ping/pong and close handshakes live
//! here.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`
//! - `tls`: `wss://` support through rustls with webpki roots
//! - `mock`: a scripted in-memory transport for tests

#![allow(async_fn_in_trait)]

mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;

/// Close code reported when the stream ends without a close frame
/// (RFC 6455 "abnormal closure").
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported for a close frame that carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Close code used for a clean, locally requested close.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why the remote side (or the stream itself) ended the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code.
    pub code: u16,
    /// Human-readable reason, possibly empty.
    pub reason: String,
}

impl CloseReason {
    /// The close reason used when the stream ended without a close frame.
    pub fn abnormal() -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.reason)
        }
    }
}

/// One unit of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete text frame.
    Text(String),
    /// The connection is closed. No further frames will arrive.
    Closed(CloseReason),
}

/// Opens outbound connections.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Opens a connection to `url`.
    async fn connect(
        &self,
        url: &str,
    ) -> Result<Self::Connection, TransportError>;
}

/// A single open connection that exchanges text frames.
pub trait Connection: Send + Sync + 'static {
    /// Sends one text frame to the remote peer.
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(Received::Closed(..))` when the connection is closed,
    /// cleanly or not.
    async fn recv(&self) -> Result<Received, TransportError>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

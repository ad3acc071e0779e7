//! # aptrack
//!
//! Live tracking for Archipelago multiworld rooms.
//!
//! aptrack connects to a room as a passive tracker, walks the handshake,
//! and folds everything the server says into one [`Session`] with
//! games, locations, items and hints, names resolved from the room's
//! data package.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aptrack::prelude::*;
//!
//! # async fn run() -> Result<(), AptrackError> {
//! let settings = ConnectionSettings::from_env()?;
//! let mut tracker = Coordinator::new(WebSocketConnector, settings);
//! tracker.connect().await?;
//! tracker.run().await;
//! println!("{}", tracker.session().summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! aptrack-transport  text frames over WebSocket
//! aptrack-protocol   packets and the frame codec
//! aptrack-client     one connection, typed events
//! aptrack-session    the reconciled session model
//! aptrack            handshake coordinator (this crate)
//! ```
//!
//! [`Session`]: aptrack_session::Session

mod config;
mod coordinator;
mod error;

pub use config::{ConnectionSettings, SettingsProvider};
pub use coordinator::{ConnectionStatus, Coordinator, CoordinatorBuilder};
pub use error::AptrackError;

pub use aptrack_client as client;
pub use aptrack_protocol as protocol;
pub use aptrack_session as session;
pub use aptrack_transport as transport;

pub mod prelude {
    pub use crate::{
        AptrackError, ConnectionSettings, ConnectionStatus, Coordinator,
        CoordinatorBuilder, SettingsProvider,
    };
    pub use aptrack_client::{ClientEvent, EventKind, ProtocolClient};
    pub use aptrack_protocol::{ItemId, LocationId, SlotId};
    pub use aptrack_session::{
        Game, Hint, Importance, Item, Location, Reconciler, Session,
        SessionSummary,
    };
    pub use aptrack_transport::{Connection, Connector, WebSocketConnector};
}

//! Archipelago protocol client for aptrack.
//!
//! [`ProtocolClient`] owns one transport connection. It frames outbound
//! packets, decodes inbound frames, keeps the small per-connection caches
//! the protocol implies (server version, slot and player tables, data
//! package), and turns every meaningful packet into a [`ClientEvent`].
//!
//! Events reach two places: observers registered with
//! [`ProtocolClient::subscribe`], and a queue the owner drains with
//! [`ProtocolClient::drain_events`].

mod client;
mod error;
mod event;
mod observer;

pub use client::{ProtocolClient, TRACKER_TAGS};
pub use error::ClientError;
pub use event::{ClientEvent, EventKind};
pub use observer::SubscriptionId;

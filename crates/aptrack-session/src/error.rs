//! Error types for reconciliation.
//!
//! None of these abort a fold. They describe an event the reconciler
//! had to defer or drop, and are reported once through
//! [`Diagnostics`](crate::Diagnostics).

use aptrack_protocol::SlotId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// A packet arrived before any `Connected` told us which slot we are.
    #[error("{cmd} arrived before the slot table; deferred")]
    NotConnected { cmd: &'static str },

    /// A packet referenced a slot with no game in the session, after the
    /// slot table arrived.
    #[error("{cmd} references {slot}, which has no game; dropped")]
    UnknownSlot { cmd: &'static str, slot: SlotId },

    /// The deferred queue is full; further early packets are dropped.
    #[error("deferred queue full ({capacity} packets); dropping {cmd}")]
    DeferredQueueFull { cmd: &'static str, capacity: usize },
}

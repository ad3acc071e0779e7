//! Session reconciliation for aptrack.
//!
//! The [`Reconciler`] owns one [`Session`] and folds decoded server
//! packets into it. It never talks to the network; the coordinator
//! feeds it whatever the protocol client emits, in arrival order.
//!
//! Identifiers become names through the [`TranslationCache`], which is
//! filled from data packages and outlives any single connection.

mod diagnostics;
mod error;
mod model;
mod reconciler;
mod translation;

pub use diagnostics::Diagnostics;
pub use error::ReconcileError;
pub use model::{
    Discovery, Game, Hint, Importance, Item, Location, ScoutedItem, Session,
    SessionSummary,
};
pub use reconciler::{DEFERRED_CAPACITY, Reconciler};
pub use translation::{GameTables, MergeOutcome, TranslationCache};

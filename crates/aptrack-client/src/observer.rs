//! Per-kind observer registry.

use std::fmt;

use crate::{ClientEvent, EventKind};

/// Handle returned by [`ProtocolClient::subscribe`](crate::ProtocolClient::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Callback = Box<dyn FnMut(&ClientEvent) + Send>;

struct Entry {
    id: SubscriptionId,
    kind: EventKind,
    callback: Callback,
}

/// Observers in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    entries: Vec<Entry>,
}

impl Observers {
    pub(crate) fn subscribe(
        &mut self,
        kind: EventKind,
        callback: Callback,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push(Entry { id, kind, callback });
        id
    }

    /// Removes exactly one registration. Returns `false` if `id` was
    /// not registered.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&mut self, event: &ClientEvent) {
        let kind = event.kind();
        for entry in self.entries.iter_mut().filter(|e| e.kind == kind) {
            (entry.callback)(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

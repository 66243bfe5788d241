//! Handler registries shared by the socket, channel and presence bindings.
//!
//! Handlers are stored as `Arc`s so callers can snapshot them under a lock
//! and invoke them after the lock is released. A handler may therefore push,
//! subscribe or unsubscribe without deadlocking.

#[cfg(test)]
#[path = "subscription_test.rs"]
mod subscription_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by every `on*` registration; pass it back to `off*`.
///
/// Ids are unique across all registries in the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ordered list of handlers keyed by subscription id.
pub(crate) struct Listeners<H: ?Sized> {
    entries: Vec<(SubscriptionId, Arc<H>)>,
}

impl<H: ?Sized> Default for Listeners<H> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<H: ?Sized> Listeners<H> {
    pub(crate) fn insert(&mut self, handler: Arc<H>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.entries.push((id, handler));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Handlers in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<H>> {
        self.entries.iter().map(|(_, handler)| Arc::clone(handler)).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

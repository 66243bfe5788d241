//! Presence roster tracked over a channel.
//!
//! The server sends one `presence_state` snapshot after join and
//! `presence_diff` broadcasts afterwards. This module folds both into a single
//! roster and hands every `on_sync` subscriber the complete list, never a
//! partial diff. Diffs that arrive before the snapshot for the current join
//! are held back and applied once the snapshot lands.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;

use super::channel::Channel;
use super::subscription::{Listeners, SubscriptionId};
use super::types::{PRESENCE_DIFF, PRESENCE_STATE, PresenceDiffPayload, PresenceMeta, PresenceStatePayload};

/// One tracked user and every connection they hold.
#[derive(Clone, Debug, PartialEq)]
pub struct PresenceEntry {
    pub key: String,
    pub metas: Vec<PresenceMeta>,
}

impl PresenceEntry {
    /// Metadata of the user's first connection, used for display.
    pub fn first_meta(&self) -> Option<&PresenceMeta> {
        self.metas.first()
    }
}

/// Handler receiving the full roster after every change.
pub type SyncHandler = Arc<dyn Fn(&[PresenceEntry]) + Send + Sync>;

type SyncFn = dyn Fn(&[PresenceEntry]) + Send + Sync;

#[derive(Clone)]
pub struct Presence {
    inner: Arc<Mutex<PresenceInner>>,
    channel: Channel,
    bindings: [SubscriptionId; 2],
}

#[derive(Default)]
struct PresenceInner {
    state: PresenceStatePayload,
    pending_diffs: Vec<PresenceDiffPayload>,
    /// Join ref the current `state` snapshot belongs to.
    join_ref: Option<String>,
    listeners: Listeners<SyncFn>,
}

impl Presence {
    /// Start tracking presence on `channel`.
    pub fn attach(channel: &Channel) -> Self {
        let inner = Arc::new(Mutex::new(PresenceInner::default()));

        let state_id = channel.on(PRESENCE_STATE, {
            let inner = Arc::clone(&inner);
            let channel = channel.clone();
            move |payload| handle_state(&inner, &channel, payload)
        });
        let diff_id = channel.on(PRESENCE_DIFF, {
            let inner = Arc::clone(&inner);
            let channel = channel.clone();
            move |payload| handle_diff(&inner, &channel, payload)
        });

        Self { inner, channel: channel.clone(), bindings: [state_id, diff_id] }
    }

    /// Register a handler called with the full roster on every change.
    pub fn on_sync(&self, handler: impl Fn(&[PresenceEntry]) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribe_sync(Arc::new(handler))
    }

    pub fn subscribe_sync(&self, handler: SyncHandler) -> SubscriptionId {
        self.inner.lock().listeners.insert(handler)
    }

    pub fn off_sync(&self, id: SubscriptionId) -> bool {
        self.inner.lock().listeners.remove(id)
    }

    /// Current roster.
    pub fn list(&self) -> Vec<PresenceEntry> {
        list(&self.inner.lock().state)
    }

    /// Unhook from the channel and drop every sync handler.
    pub fn detach(&self) {
        for id in self.bindings {
            self.channel.off(id);
        }
        let mut inner = self.inner.lock();
        inner.listeners.clear();
        inner.pending_diffs.clear();
    }
}

fn handle_state(inner: &Mutex<PresenceInner>, channel: &Channel, payload: &Value) {
    let snapshot = match PresenceStatePayload::deserialize(payload) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("dropping malformed presence_state on {}: {e}", channel.topic());
            return;
        }
    };
    let join_ref = channel.join_ref();
    let (roster, handlers) = {
        let mut inner = inner.lock();
        inner.join_ref = join_ref;
        inner.state = snapshot;
        let pending = std::mem::take(&mut inner.pending_diffs);
        for diff in pending {
            apply_diff(&mut inner.state, diff);
        }
        (list(&inner.state), inner.listeners.snapshot())
    };
    for handler in handlers {
        handler(roster.as_slice());
    }
}

fn handle_diff(inner: &Mutex<PresenceInner>, channel: &Channel, payload: &Value) {
    let diff = match PresenceDiffPayload::deserialize(payload) {
        Ok(diff) => diff,
        Err(e) => {
            log::warn!("dropping malformed presence_diff on {}: {e}", channel.topic());
            return;
        }
    };
    let join_ref = channel.join_ref();
    let (roster, handlers) = {
        let mut inner = inner.lock();
        if inner.join_ref.is_none() || inner.join_ref != join_ref {
            inner.pending_diffs.push(diff);
            return;
        }
        apply_diff(&mut inner.state, diff);
        (list(&inner.state), inner.listeners.snapshot())
    };
    for handler in handlers {
        handler(roster.as_slice());
    }
}

/// Fold one diff into `state`.
///
/// Joins keep the key's existing metas that are not re-announced, followed
/// by the joined metas. Leaves drop metas by `phx_ref`; a key with no metas
/// left is removed.
pub fn apply_diff(state: &mut PresenceStatePayload, diff: PresenceDiffPayload) {
    for (key, joined) in diff.joins {
        let joined_refs = refs_of(&joined.metas);
        let entry = state.entry(key).or_default();
        let mut metas = std::mem::take(&mut entry.metas)
            .into_iter()
            .filter(|m| !m.phx_ref.as_ref().is_some_and(|r| joined_refs.contains(r)))
            .collect::<Vec<_>>();
        metas.extend(joined.metas);
        entry.metas = metas;
    }

    for (key, left) in diff.leaves {
        let Some(entry) = state.get_mut(&key) else {
            continue;
        };
        let left_refs = refs_of(&left.metas);
        entry.metas.retain(|m| !m.phx_ref.as_ref().is_some_and(|r| left_refs.contains(r)));
        if entry.metas.is_empty() {
            state.remove(&key);
        }
    }
}

/// Roster view of a presence state, in key order.
pub fn list(state: &PresenceStatePayload) -> Vec<PresenceEntry> {
    state
        .iter()
        .map(|(key, entry)| PresenceEntry { key: key.clone(), metas: entry.metas.clone() })
        .collect()
}

fn refs_of(metas: &[PresenceMeta]) -> HashSet<String> {
    metas.iter().filter_map(|m| m.phx_ref.clone()).collect()
}

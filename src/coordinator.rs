//! Chat coordinator: one socket, one room channel, one presence.
//!
//! DESIGN
//! ======
//! The coordinator holds no chat data. It owns the bindings for the current
//! room and a list of durable subscriptions registered by the view. When the
//! room changes, the old channel's subscriptions are torn down (presence
//! detached, channel left) before the new channel is created and every
//! durable subscription is bound to it. Views therefore subscribe once and
//! never see events from a previous room.
//!
//! `use_chat` lifts the coordinator into Leptos signals for components.

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_test;

use std::sync::Arc;

use leptos::prelude::*;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ChatConfig, room_topic};
use crate::error::ChatError;
use crate::net::channel::{Channel, ChannelState, EventHandler};
use crate::net::presence::{Presence, PresenceEntry, SyncHandler};
use crate::net::socket::{Socket, SocketState};
use crate::net::subscription::{Listeners, SubscriptionId};
use crate::net::transport::{Transport, default_transport};

type ChannelStateHandler = dyn Fn(ChannelState) + Send + Sync;

#[derive(Clone)]
pub struct ChatCoordinator {
    socket: Socket,
    inner: Arc<Mutex<CoordinatorInner>>,
}

#[derive(Default)]
struct CoordinatorInner {
    room: Option<RoomBinding>,
    events: Vec<EventSubscription>,
    syncs: Vec<SyncSubscription>,
    channel_listeners: Listeners<ChannelStateHandler>,
}

/// Bindings for the active room.
struct RoomBinding {
    room_id: String,
    channel: Channel,
    presence: Presence,
    state_forward: SubscriptionId,
}

struct EventSubscription {
    id: SubscriptionId,
    event: String,
    handler: EventHandler,
    /// Registration on the current channel, if any.
    bound: Option<SubscriptionId>,
}

struct SyncSubscription {
    id: SubscriptionId,
    handler: SyncHandler,
    bound: Option<SubscriptionId>,
}

impl ChatCoordinator {
    pub fn new(config: &ChatConfig, transport: Arc<dyn Transport>) -> Self {
        Self { socket: Socket::new(config, transport), inner: Arc::new(Mutex::new(CoordinatorInner::default())) }
    }

    pub fn connect(&self) {
        self.socket.connect();
    }

    pub fn disconnect(&self) {
        self.socket.disconnect();
    }

    pub fn socket_state(&self) -> SocketState {
        self.socket.state()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.inner
            .lock()
            .room
            .as_ref()
            .map_or(ChannelState::Closed, |room| room.channel.state())
    }

    /// Room currently bound, if any.
    pub fn room_id(&self) -> Option<String> {
        self.inner.lock().room.as_ref().map(|room| room.room_id.clone())
    }

    pub fn on_socket_state(&self, handler: impl Fn(SocketState) + Send + Sync + 'static) -> SubscriptionId {
        self.socket.on_state_change(handler)
    }

    /// Observe the state of whichever room channel is current.
    pub fn on_channel_state(&self, handler: impl Fn(ChannelState) + Send + Sync + 'static) -> SubscriptionId {
        self.inner.lock().channel_listeners.insert(Arc::new(handler))
    }

    /// Switch to `room_id`. No-op when that room is already bound.
    pub fn set_room(&self, room_id: &str, params: Value) {
        let previous = {
            let mut inner = self.inner.lock();
            if inner.room.as_ref().is_some_and(|room| room.room_id == room_id) {
                return;
            }
            let previous = inner.room.take();
            for sub in &mut inner.events {
                sub.bound = None;
            }
            for sub in &mut inner.syncs {
                sub.bound = None;
            }
            previous
        };
        let replaced = previous.is_some();
        if let Some(previous) = previous {
            teardown(&previous);
        }

        let channel = self.socket.channel(&room_topic(room_id), params);
        let presence = Presence::attach(&channel);
        let state_forward = channel.on_state_change({
            let inner = Arc::clone(&self.inner);
            move |state| notify_channel_state(&inner, state)
        });

        let sync_handlers = {
            let mut inner = self.inner.lock();
            for sub in &mut inner.events {
                sub.bound = Some(channel.subscribe(&sub.event, Arc::clone(&sub.handler)));
            }
            for sub in &mut inner.syncs {
                sub.bound = Some(presence.subscribe_sync(Arc::clone(&sub.handler)));
            }
            inner.room = Some(RoomBinding {
                room_id: room_id.to_owned(),
                channel: channel.clone(),
                presence,
                state_forward,
            });
            inner.syncs.iter().map(|sub| Arc::clone(&sub.handler)).collect::<Vec<_>>()
        };
        log::debug!("bound room {room_id}");

        // The old room's roster no longer applies.
        if replaced {
            for handler in sync_handlers {
                handler(&[]);
            }
        }

        notify_channel_state(&self.inner, channel.state());
        channel.join();
    }

    /// Publish on the current room channel. Best effort.
    pub fn publish(&self, event: &str, payload: &impl Serialize) -> Result<(), ChatError> {
        let channel = self.inner.lock().room.as_ref().map(|room| room.channel.clone());
        match channel {
            Some(channel) => channel.push(event, payload),
            None => Err(ChatError::NoRoom),
        }
    }

    /// Subscribe to an inbound room event for the lifetime of the coordinator,
    /// across room changes.
    pub fn on_event(&self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) -> SubscriptionId {
        let handler: EventHandler = Arc::new(handler);
        let mut inner = self.inner.lock();
        let bound = inner
            .room
            .as_ref()
            .map(|room| room.channel.subscribe(event, Arc::clone(&handler)));
        let id = SubscriptionId::next();
        inner.events.push(EventSubscription { id, event: event.to_owned(), handler, bound });
        id
    }

    /// Subscribe to full-roster presence syncs across room changes.
    pub fn on_presence_sync(
        &self,
        handler: impl Fn(&[PresenceEntry]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let handler: SyncHandler = Arc::new(handler);
        let mut inner = self.inner.lock();
        let bound = inner
            .room
            .as_ref()
            .map(|room| room.presence.subscribe_sync(Arc::clone(&handler)));
        let id = SubscriptionId::next();
        inner.syncs.push(SyncSubscription { id, handler, bound });
        id
    }

    /// End a subscription made with `on_event`, `on_presence_sync` or
    /// `on_channel_state`.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.events.iter().position(|sub| sub.id == id) {
            let sub = inner.events.remove(pos);
            if let (Some(bound), Some(room)) = (sub.bound, inner.room.as_ref()) {
                room.channel.off(bound);
            }
            return true;
        }
        if let Some(pos) = inner.syncs.iter().position(|sub| sub.id == id) {
            let sub = inner.syncs.remove(pos);
            if let (Some(bound), Some(room)) = (sub.bound, inner.room.as_ref()) {
                room.presence.off_sync(bound);
            }
            return true;
        }
        inner.channel_listeners.remove(id)
    }

    /// Leave the room, drop all subscriptions and disconnect.
    pub fn shutdown(&self) {
        let room = {
            let mut inner = self.inner.lock();
            inner.events.clear();
            inner.syncs.clear();
            inner.channel_listeners.clear();
            inner.room.take()
        };
        if let Some(room) = room {
            teardown(&room);
        }
        self.socket.disconnect();
    }
}

fn teardown(room: &RoomBinding) {
    log::debug!("leaving room {}", room.room_id);
    room.channel.off_state_change(room.state_forward);
    room.presence.detach();
    room.channel.leave();
}

fn notify_channel_state(inner: &Mutex<CoordinatorInner>, state: ChannelState) {
    let handlers = inner.lock().channel_listeners.snapshot();
    for handler in handlers {
        handler(state);
    }
}

/// Reactive handle returned by `use_chat`.
#[derive(Clone)]
pub struct UseChat {
    pub socket_state: ReadSignal<SocketState>,
    pub channel_state: ReadSignal<ChannelState>,
    coordinator: ChatCoordinator,
}

impl UseChat {
    pub fn connect(&self) {
        self.coordinator.connect();
    }

    pub fn disconnect(&self) {
        self.coordinator.disconnect();
    }

    /// Publish on the room channel, logging failures.
    pub fn publish(&self, event: &str, payload: &impl Serialize) -> bool {
        match self.coordinator.publish(event, payload) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("publish {event} dropped: {e}");
                false
            }
        }
    }

    pub fn on_event(&self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) -> SubscriptionId {
        self.coordinator.on_event(event, handler)
    }

    pub fn on_presence_sync(
        &self,
        handler: impl Fn(&[PresenceEntry]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.coordinator.on_presence_sync(handler)
    }

    pub fn off(&self, id: SubscriptionId) {
        self.coordinator.off(id);
    }
}

/// Connect the coordinator to the reactive graph.
///
/// Socket and channel state become signals; the room follows `room_id`;
/// everything is shut down when the owning component is cleaned up.
pub fn use_chat(config: &ChatConfig, room_id: Signal<String>) -> UseChat {
    let socket_state = RwSignal::new(SocketState::Uninstantiated);
    let channel_state = RwSignal::new(ChannelState::Closed);

    let coordinator = ChatCoordinator::new(config, default_transport());
    coordinator.on_socket_state(move |state| socket_state.set(state));
    coordinator.on_channel_state(move |state| channel_state.set(state));

    let params = config.join_params.clone();
    coordinator.set_room(&room_id.get_untracked(), params.clone());

    Effect::new({
        let coordinator = coordinator.clone();
        move || {
            let room = room_id.get();
            coordinator.set_room(&room, params.clone());
        }
    });

    on_cleanup({
        let coordinator = coordinator.clone();
        move || coordinator.shutdown()
    });

    UseChat { socket_state: socket_state.read_only(), channel_state: channel_state.read_only(), coordinator }
}

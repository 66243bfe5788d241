//! Topic-scoped channel multiplexed over a `Socket`.
//!
//! SYSTEM CONTEXT
//! ==============
//! A channel is one join of one topic. Each join attempt gets a fresh join
//! ref; inbound frames that carry a different join ref belong to an earlier
//! incarnation and are dropped. After `leave()` the channel is unregistered
//! from the socket and its handler table is empty, so nothing registered on
//! it can fire again.
//!
//! A join that is refused, answered with `phx_error`, or left unanswered past
//! the join timeout while the socket is open is retried on the socket's
//! backoff schedule. Joins lost to a socket drop are resent when the socket
//! reopens instead.

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use super::socket::Socket;
use super::subscription::{Listeners, SubscriptionId};
use super::types::{Message, PHX_CLOSE, PHX_ERROR, PHX_JOIN, PHX_LEAVE, PHX_REPLY, Reply};
use crate::error::ChatError;

/// Join lifecycle of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Closed,
    Errored,
    Joined,
    Joining,
    Leaving,
}

impl ChannelState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::Errored => "Errored",
            Self::Joined => "Joined",
            Self::Joining => "Joining",
            Self::Leaving => "Leaving",
        }
    }
}

/// Handler for one named inbound event. Receives the raw payload.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

type StateHandler = dyn Fn(ChannelState) + Send + Sync;

#[derive(Clone)]
pub struct Channel {
    topic: Arc<str>,
    inner: Arc<Mutex<ChannelInner>>,
    socket: Socket,
}

struct ChannelInner {
    params: Value,
    state: ChannelState,
    join_ref: Option<String>,
    rejoin_attempts: u32,
    router: EventRouter,
    listeners: Listeners<StateHandler>,
}

/// Event name to handler table, kept in registration order.
#[derive(Default)]
struct EventRouter {
    routes: Vec<Route>,
}

struct Route {
    id: SubscriptionId,
    event: String,
    handler: EventHandler,
}

impl EventRouter {
    fn subscribe(&mut self, event: &str, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.routes.push(Route { id, event: event.to_owned(), handler });
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r.id != id);
        self.routes.len() != before
    }

    fn handlers_for(&self, event: &str) -> Vec<EventHandler> {
        self.routes
            .iter()
            .filter(|r| r.event == event)
            .map(|r| Arc::clone(&r.handler))
            .collect()
    }

    fn clear(&mut self) {
        self.routes.clear();
    }
}

impl Channel {
    pub(crate) fn new(socket: Socket, topic: &str, params: Value) -> Self {
        let inner = ChannelInner {
            params,
            state: ChannelState::Closed,
            join_ref: None,
            rejoin_attempts: 0,
            router: EventRouter::default(),
            listeners: Listeners::default(),
        };
        Self { topic: Arc::from(topic), inner: Arc::new(Mutex::new(inner)), socket }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    pub fn join_ref(&self) -> Option<String> {
        self.inner.lock().join_ref.clone()
    }

    pub(crate) fn ptr_eq(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Join the topic. Sent now if the socket is open, otherwise on open.
    pub fn join(&self) {
        if matches!(self.state(), ChannelState::Joining | ChannelState::Joined) {
            log::debug!("channel {} already joining", self.topic);
            return;
        }
        self.send_join();
    }

    /// Publish `payload` under `event`. Best effort: fails when not joined.
    pub fn push(&self, event: &str, payload: &impl Serialize) -> Result<(), ChatError> {
        let payload = serde_json::to_value(payload).map_err(ChatError::Encode)?;
        let join_ref = {
            let inner = self.inner.lock();
            if inner.state != ChannelState::Joined {
                return Err(ChatError::NotJoined { topic: self.topic.to_string() });
            }
            inner.join_ref.clone()
        };
        let msg = Message {
            join_ref,
            msg_ref: Some(self.socket.make_ref()),
            topic: self.topic.to_string(),
            event: event.to_owned(),
            payload,
        };
        self.socket.push(&msg)
    }

    /// Register `handler` for inbound `event` frames.
    pub fn on(&self, event: &str, handler: impl Fn(&Value) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribe(event, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn subscribe(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        self.inner.lock().router.subscribe(event, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.lock().router.unsubscribe(id)
    }

    pub fn on_state_change(&self, handler: impl Fn(ChannelState) + Send + Sync + 'static) -> SubscriptionId {
        self.inner.lock().listeners.insert(Arc::new(handler))
    }

    pub fn off_state_change(&self, id: SubscriptionId) -> bool {
        self.inner.lock().listeners.remove(id)
    }

    /// Leave the topic and drop every handler.
    pub fn leave(&self) {
        let (was, join_ref) = {
            let mut inner = self.inner.lock();
            inner.router.clear();
            (inner.state, inner.join_ref.clone())
        };
        if matches!(was, ChannelState::Joined | ChannelState::Joining) {
            self.set_state(ChannelState::Leaving);
            if self.socket.is_connected() {
                let msg = Message {
                    join_ref: join_ref.clone(),
                    msg_ref: Some(self.socket.make_ref()),
                    topic: self.topic.to_string(),
                    event: PHX_LEAVE.to_owned(),
                    payload: serde_json::json!({}),
                };
                if let Err(e) = self.socket.push(&msg) {
                    log::debug!("leave for {} not sent: {e}", self.topic);
                }
            }
        }
        self.set_state(ChannelState::Closed);
        self.inner.lock().listeners.clear();
        self.socket.remove_channel(self);
    }

    /// Socket reopened: resend the join for channels still waiting on one.
    pub(crate) fn rejoin_if_pending(&self) {
        if matches!(self.state(), ChannelState::Joining | ChannelState::Errored) {
            self.send_join();
        }
    }

    /// Socket dropped: joined or joining channels are now errored.
    pub(crate) fn handle_socket_close(&self) {
        if matches!(self.state(), ChannelState::Joined | ChannelState::Joining) {
            self.set_state(ChannelState::Errored);
        }
    }

    /// Handle one inbound frame addressed to this topic.
    pub(crate) fn trigger(&self, msg: &Message) {
        let (transition, handlers) = {
            let mut inner = self.inner.lock();
            if msg.join_ref.is_some() && msg.join_ref != inner.join_ref {
                log::debug!("dropping {} for stale join of {}", msg.event, self.topic);
                return;
            }
            match msg.event.as_str() {
                PHX_REPLY => {
                    let is_join_reply = inner.state == ChannelState::Joining
                        && msg.msg_ref.is_some()
                        && msg.msg_ref == inner.join_ref;
                    if !is_join_reply {
                        return;
                    }
                    let next = match msg.payload_as::<Reply>() {
                        Ok(reply) if reply.is_ok() => {
                            inner.rejoin_attempts = 0;
                            ChannelState::Joined
                        }
                        Ok(reply) => {
                            log::warn!("join of {} refused: {}", self.topic, reply.response);
                            ChannelState::Errored
                        }
                        Err(e) => {
                            log::warn!("join reply for {} unreadable: {e}", self.topic);
                            ChannelState::Errored
                        }
                    };
                    (Some(next), Vec::new())
                }
                PHX_ERROR => {
                    let errored = matches!(inner.state, ChannelState::Joined | ChannelState::Joining);
                    (errored.then_some(ChannelState::Errored), Vec::new())
                }
                PHX_CLOSE => (Some(ChannelState::Closed), Vec::new()),
                event => (None, inner.router.handlers_for(event)),
            }
        };
        if let Some(next) = transition {
            self.set_state(next);
            if next == ChannelState::Errored {
                self.schedule_rejoin();
            }
        }
        for handler in handlers {
            handler(&msg.payload);
        }
    }

    fn send_join(&self) {
        let join_ref = self.socket.make_ref();
        let params = {
            let mut inner = self.inner.lock();
            inner.join_ref = Some(join_ref.clone());
            inner.params.clone()
        };
        self.set_state(ChannelState::Joining);
        if !self.socket.is_connected() {
            return;
        }
        let msg = Message {
            join_ref: Some(join_ref.clone()),
            msg_ref: Some(join_ref.clone()),
            topic: self.topic.to_string(),
            event: PHX_JOIN.to_owned(),
            payload: params,
        };
        match self.socket.push(&msg) {
            Ok(()) => self.watch_join(join_ref),
            Err(e) => log::debug!("join for {} not sent: {e}", self.topic),
        }
    }

    /// Retry the join later, on the socket's backoff schedule.
    fn schedule_rejoin(&self) {
        let attempt = {
            let mut inner = self.inner.lock();
            let attempt = inner.rejoin_attempts;
            inner.rejoin_attempts = attempt.saturating_add(1);
            attempt
        };
        let Some(delay) = self.socket.rejoin_delay(attempt) else {
            return;
        };
        log::debug!("rejoining {} in {}ms", self.topic, delay.as_millis());
        let channel = self.clone();
        self.socket.schedule(delay, Box::new(move || channel.rejoin_if_errored()));
    }

    fn rejoin_if_errored(&self) {
        // A closed socket rejoins on reopen; a left channel stays closed.
        if self.state() == ChannelState::Errored && self.socket.is_connected() {
            self.send_join();
        }
    }

    /// Error the channel if the join sent under `join_ref` is never answered.
    fn watch_join(&self, join_ref: String) {
        let channel = self.clone();
        let timeout = self.socket.join_timeout();
        self.socket.schedule(timeout, Box::new(move || channel.join_timed_out(&join_ref)));
    }

    fn join_timed_out(&self, join_ref: &str) {
        let pending = {
            let inner = self.inner.lock();
            inner.state == ChannelState::Joining && inner.join_ref.as_deref() == Some(join_ref)
        };
        if !pending || !self.socket.is_connected() {
            return;
        }
        log::warn!("join of {} timed out", self.topic);
        self.set_state(ChannelState::Errored);
        self.schedule_rejoin();
    }

    fn set_state(&self, next: ChannelState) {
        let handlers = {
            let mut inner = self.inner.lock();
            if inner.state == next {
                return;
            }
            inner.state = next;
            inner.listeners.snapshot()
        };
        for handler in handlers {
            handler(next);
        }
    }
}

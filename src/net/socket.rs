//! Realtime socket: connection lifecycle, heartbeats and inbound routing.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Socket` is a cheap `Clone` handle. It tracks the observable
//! `SocketState`, allocates message refs, owns the outbound queue of the
//! live connection, and routes decoded frames to the channels registered on
//! it. The actual bytes move through a `Transport` (see `transport`).
//!
//! Lifecycle: `connect()` moves to `Connecting` and asks the transport to
//! open. The transport reports `opened`, which moves to `Open` and rejoins
//! pending channels, and eventually `closed`, which moves to `Closed`,
//! errors joined channels and, unless the user asked to disconnect, returns a
//! reconnect delay from the configured backoff policy.

#[cfg(test)]
#[path = "socket_test.rs"]
mod socket_test;

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;
use parking_lot::Mutex;

use super::channel::Channel;
use super::subscription::{Listeners, SubscriptionId};
use super::transport::{Task, Transport, TransportLink};
use super::types::{HEARTBEAT, Message, PHOENIX_TOPIC, PHX_REPLY, PROTOCOL_VSN};
use crate::config::{ChatConfig, ReconnectPolicy};
use crate::error::ChatError;

/// Connection state of the socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketState {
    #[default]
    Uninstantiated,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SocketState {
    /// Human-readable label for status displays.
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninstantiated => "Uninstantiated",
            Self::Connecting => "Connecting",
            Self::Open => "Open",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
        }
    }
}

/// Result of one heartbeat tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Heartbeat {
    /// A heartbeat was pushed.
    Sent,
    /// The previous heartbeat was never acknowledged; drop the connection.
    TimedOut,
    /// Nothing to do (not open, or the connection is stale).
    Idle,
}

type StateHandler = dyn Fn(SocketState) + Send + Sync;

#[derive(Clone)]
pub struct Socket {
    inner: Arc<Mutex<SocketInner>>,
    transport: Arc<dyn Transport>,
}

struct SocketInner {
    endpoint: String,
    heartbeat_interval: Duration,
    join_timeout: Duration,
    reconnect: ReconnectPolicy,
    state: SocketState,
    conn_id: u64,
    outbound: Option<UnboundedSender<String>>,
    next_ref: u64,
    pending_heartbeat: Option<String>,
    user_closed: bool,
    reconnect_attempts: u32,
    channels: Vec<Channel>,
    listeners: Listeners<StateHandler>,
}

/// Full websocket URL for a socket base endpoint.
pub fn endpoint_url(endpoint: &str) -> String {
    format!("{}/websocket?vsn={PROTOCOL_VSN}", endpoint.trim_end_matches('/'))
}

impl Socket {
    pub fn new(config: &ChatConfig, transport: Arc<dyn Transport>) -> Self {
        let inner = SocketInner {
            endpoint: config.endpoint.clone(),
            heartbeat_interval: Duration::from_millis(u64::from(config.heartbeat_interval_ms)),
            join_timeout: Duration::from_millis(u64::from(config.join_timeout_ms)),
            reconnect: config.reconnect,
            state: SocketState::Uninstantiated,
            conn_id: 0,
            outbound: None,
            next_ref: 0,
            pending_heartbeat: None,
            user_closed: false,
            reconnect_attempts: 0,
            channels: Vec::new(),
            listeners: Listeners::default(),
        };
        Self { inner: Arc::new(Mutex::new(inner)), transport }
    }

    pub fn state(&self) -> SocketState {
        self.inner.lock().state
    }

    /// Register a handler called on every state transition.
    pub fn on_state_change(&self, handler: impl Fn(SocketState) + Send + Sync + 'static) -> SubscriptionId {
        self.inner.lock().listeners.insert(Arc::new(handler))
    }

    pub fn off_state_change(&self, id: SubscriptionId) -> bool {
        self.inner.lock().listeners.remove(id)
    }

    /// Start connecting. No-op while already connecting or open.
    pub fn connect(&self) {
        let (url, conn_id) = {
            let mut inner = self.inner.lock();
            if matches!(inner.state, SocketState::Connecting | SocketState::Open) {
                return;
            }
            inner.user_closed = false;
            inner.conn_id += 1;
            (endpoint_url(&inner.endpoint), inner.conn_id)
        };
        log::debug!("socket connecting to {url}");
        self.set_state(SocketState::Connecting);
        self.transport.open(&url, TransportLink::new(self.clone(), conn_id));
    }

    /// Close the connection on the user's behalf. No reconnect follows.
    pub fn disconnect(&self) {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, SocketState::Connecting | SocketState::Open) {
                return;
            }
            inner.user_closed = true;
            inner.pending_heartbeat = None;
            // Dropping the sender ends the transport's writer, which closes the socket.
            inner.outbound = None;
        }
        log::debug!("socket disconnect requested");
        self.set_state(SocketState::Closing);
    }

    /// Create a channel for `topic` and register it for inbound routing.
    pub fn channel(&self, topic: &str, params: serde_json::Value) -> Channel {
        let channel = Channel::new(self.clone(), topic, params);
        self.inner.lock().channels.push(channel.clone());
        channel
    }

    /// Stop routing frames to `channel`.
    pub(crate) fn remove_channel(&self, channel: &Channel) {
        self.inner.lock().channels.retain(|c| !c.ptr_eq(channel));
    }

    /// Allocate the next message ref.
    pub fn make_ref(&self) -> String {
        let mut inner = self.inner.lock();
        inner.next_ref += 1;
        inner.next_ref.to_string()
    }

    /// True when a live connection can accept frames.
    pub fn is_connected(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == SocketState::Open && inner.outbound.is_some()
    }

    /// Queue a frame on the live connection.
    pub fn push(&self, msg: &Message) -> Result<(), ChatError> {
        let text = msg.encode()?;
        let inner = self.inner.lock();
        send_locked(&inner, text)
    }

    pub(crate) fn heartbeat_interval(&self) -> Duration {
        self.inner.lock().heartbeat_interval
    }

    pub(crate) fn join_timeout(&self) -> Duration {
        self.inner.lock().join_timeout
    }

    /// Delay before a channel's rejoin attempt number `attempt`, or `None`
    /// when retries are disabled.
    pub(crate) fn rejoin_delay(&self, attempt: u32) -> Option<Duration> {
        let policy = self.inner.lock().reconnect;
        policy.enabled.then(|| Duration::from_millis(u64::from(policy.delay_ms(attempt))))
    }

    /// Run `task` after `delay` on the transport's timer.
    pub(crate) fn schedule(&self, delay: Duration, task: Task) {
        self.transport.schedule(delay, task);
    }

    pub(crate) fn is_current(&self, conn_id: u64) -> bool {
        self.inner.lock().conn_id == conn_id
    }

    pub(crate) fn handle_open(&self, conn_id: u64, outbound: UnboundedSender<String>) -> bool {
        let channels = {
            let mut inner = self.inner.lock();
            if inner.conn_id != conn_id || inner.state != SocketState::Connecting {
                return false;
            }
            inner.outbound = Some(outbound);
            inner.pending_heartbeat = None;
            inner.reconnect_attempts = 0;
            inner.channels.clone()
        };
        log::debug!("socket open");
        self.set_state(SocketState::Open);
        for channel in channels {
            channel.rejoin_if_pending();
        }
        true
    }

    pub(crate) fn handle_close(&self, conn_id: u64) -> Option<Duration> {
        let (channels, delay) = {
            let mut inner = self.inner.lock();
            if inner.conn_id != conn_id || inner.state == SocketState::Closed {
                return None;
            }
            inner.outbound = None;
            inner.pending_heartbeat = None;
            let delay = if !inner.user_closed && inner.reconnect.enabled {
                let ms = inner.reconnect.delay_ms(inner.reconnect_attempts);
                inner.reconnect_attempts = inner.reconnect_attempts.saturating_add(1);
                Some(Duration::from_millis(u64::from(ms)))
            } else {
                None
            };
            (inner.channels.clone(), delay)
        };
        log::debug!("socket closed");
        self.set_state(SocketState::Closed);
        for channel in channels {
            channel.handle_socket_close();
        }
        delay
    }

    pub(crate) fn reconnect_after(&self, conn_id: u64) {
        let should_reconnect = {
            let inner = self.inner.lock();
            inner.conn_id == conn_id && inner.state == SocketState::Closed && !inner.user_closed
        };
        if should_reconnect {
            self.connect();
        }
    }

    pub(crate) fn handle_text(&self, conn_id: u64, raw: &str) {
        if !self.is_current(conn_id) {
            return;
        }
        match Message::decode(raw) {
            Ok(msg) => self.route(&msg),
            Err(e) => log::warn!("dropping undecodable frame: {e}"),
        }
    }

    pub(crate) fn heartbeat(&self, conn_id: u64) -> Heartbeat {
        let mut inner = self.inner.lock();
        if inner.conn_id != conn_id || inner.state != SocketState::Open {
            return Heartbeat::Idle;
        }
        if inner.pending_heartbeat.take().is_some() {
            return Heartbeat::TimedOut;
        }
        inner.next_ref += 1;
        let msg_ref = inner.next_ref.to_string();
        let msg = Message {
            join_ref: None,
            msg_ref: Some(msg_ref.clone()),
            topic: PHOENIX_TOPIC.to_owned(),
            event: HEARTBEAT.to_owned(),
            payload: serde_json::json!({}),
        };
        match msg.encode().and_then(|text| send_locked(&inner, text)) {
            Ok(()) => {
                inner.pending_heartbeat = Some(msg_ref);
                Heartbeat::Sent
            }
            Err(e) => {
                log::debug!("heartbeat not sent: {e}");
                Heartbeat::Idle
            }
        }
    }

    /// Deliver a decoded frame to socket-level or channel handlers.
    fn route(&self, msg: &Message) {
        if msg.topic == PHOENIX_TOPIC {
            if msg.event == PHX_REPLY {
                let mut inner = self.inner.lock();
                if msg.msg_ref.is_some() && inner.pending_heartbeat == msg.msg_ref {
                    inner.pending_heartbeat = None;
                }
            }
            return;
        }

        let targets = {
            let inner = self.inner.lock();
            inner
                .channels
                .iter()
                .filter(|c| c.topic() == msg.topic)
                .cloned()
                .collect::<Vec<_>>()
        };
        if targets.is_empty() {
            log::debug!("no channel for topic {}", msg.topic);
        }
        for channel in targets {
            channel.trigger(msg);
        }
    }

    fn set_state(&self, next: SocketState) {
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

fn send_locked(inner: &SocketInner, text: String) -> Result<(), ChatError> {
    let outbound = inner.outbound.as_ref().ok_or(ChatError::NotConnected)?;
    outbound.unbounded_send(text).map_err(|_| ChatError::NotConnected)
}

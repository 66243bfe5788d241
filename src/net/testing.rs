//! In-memory transport and frame builders for driving a `Socket` in tests.

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver};
use parking_lot::Mutex;

use super::socket::Socket;
use super::transport::{Task, Transport, TransportLink};
use super::types::{Message, PHX_REPLY};
use crate::config::ChatConfig;

/// Records open requests and timers; tests decide when a connection opens
/// or drops and when timers fire.
#[derive(Default)]
pub(crate) struct MemoryTransport {
    opened: Mutex<Vec<String>>,
    pending: Mutex<Option<TransportLink>>,
    live: Mutex<Option<(TransportLink, UnboundedReceiver<String>)>>,
    timers: Mutex<Vec<(Duration, Task)>>,
}

impl Transport for MemoryTransport {
    fn open(&self, url: &str, link: TransportLink) {
        self.opened.lock().push(url.to_owned());
        *self.pending.lock() = Some(link);
    }

    fn schedule(&self, delay: Duration, task: Task) {
        self.timers.lock().push((delay, task));
    }
}

impl MemoryTransport {
    /// URLs passed to `open`, in order.
    pub(crate) fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    /// Complete the pending open. Returns what the socket answered.
    pub(crate) fn accept(&self) -> bool {
        let link = self.pending.lock().take().expect("no pending open");
        let (tx, rx) = mpsc::unbounded();
        let accepted = link.opened(tx);
        *self.live.lock() = Some((link, rx));
        accepted
    }

    /// Fail the pending open before it connects.
    pub(crate) fn fail_pending(&self) -> (Option<Duration>, TransportLink) {
        let link = self.pending.lock().take().expect("no pending open");
        (link.closed(), link)
    }

    /// Link of the live (or last) connection.
    pub(crate) fn link(&self) -> TransportLink {
        self.live.lock().as_ref().map(|(link, _)| link.clone()).expect("no live connection")
    }

    /// Drain and decode every frame the socket has queued.
    #[allow(deprecated)]
    pub(crate) fn sent(&self) -> Vec<Message> {
        let mut live = self.live.lock();
        let Some((_, rx)) = live.as_mut() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        while let Ok(Some(text)) = rx.try_next() {
            out.push(Message::decode(&text).expect("socket sent undecodable frame"));
        }
        out
    }

    /// Feed a raw frame to the socket through the live connection.
    pub(crate) fn deliver(&self, raw: &str) {
        self.link().received(raw);
    }

    /// Delays of the timers not yet fired, in scheduling order.
    pub(crate) fn timer_delays(&self) -> Vec<Duration> {
        self.timers.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Fire every pending timer whose delay is `delay`. Timers they schedule
    /// stay pending.
    pub(crate) fn fire(&self, delay: Duration) {
        let due = {
            let mut timers = self.timers.lock();
            let (due, rest) = std::mem::take(&mut *timers)
                .into_iter()
                .partition::<Vec<_>, _>(|(d, _)| *d == delay);
            *timers = rest;
            due
        };
        for (_, task) in due {
            task();
        }
    }

    /// Report the live connection as dropped.
    pub(crate) fn drop_connection(&self) -> Option<Duration> {
        self.link().closed()
    }
}

pub(crate) fn memory_socket() -> (Socket, Arc<MemoryTransport>) {
    memory_socket_with(&ChatConfig::default())
}

pub(crate) fn memory_socket_with(config: &ChatConfig) -> (Socket, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::default());
    let socket = Socket::new(config, transport.clone());
    (socket, transport)
}

/// Encoded frame with explicit refs.
pub(crate) fn frame(
    join_ref: Option<&str>,
    msg_ref: Option<&str>,
    topic: &str,
    event: &str,
    payload: serde_json::Value,
) -> String {
    Message {
        join_ref: join_ref.map(ToOwned::to_owned),
        msg_ref: msg_ref.map(ToOwned::to_owned),
        topic: topic.to_owned(),
        event: event.to_owned(),
        payload,
    }
    .encode()
    .expect("test frame encodes")
}

/// Broadcast frame (no refs).
pub(crate) fn broadcast(topic: &str, event: &str, payload: serde_json::Value) -> String {
    frame(None, None, topic, event, payload)
}

/// `phx_reply` answering the push `sent`.
pub(crate) fn reply_to(sent: &Message, status: &str) -> String {
    frame(
        sent.join_ref.as_deref(),
        sent.msg_ref.as_deref(),
        &sent.topic,
        PHX_REPLY,
        serde_json::json!({"status": status, "response": {}}),
    )
}

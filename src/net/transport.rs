//! Byte-level transport beneath the socket.
//!
//! SYSTEM CONTEXT
//! ==============
//! `Socket` owns protocol state (refs, heartbeats, channel routing) but never
//! touches a browser API directly. It asks a `Transport` to open a URL and
//! hands over a `TransportLink`; the transport reports open/receive/close
//! back through that link. In the browser this is `WebSocketTransport`
//! (gloo-net, `csr` feature); elsewhere `NullTransport` reports an immediate
//! close so the UI shows `Closed` instead of hanging in `Connecting`.

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;

use super::socket::{Heartbeat, Socket};

/// Deferred work handed to `Transport::schedule`.
pub type Task = Box<dyn FnOnce() + Send>;

/// Opens connections on behalf of a `Socket` and runs its timers.
pub trait Transport: Send + Sync {
    /// Start opening `url`. Progress is reported through `link`.
    fn open(&self, url: &str, link: TransportLink);

    /// Run `task` once after `delay`.
    fn schedule(&self, delay: Duration, task: Task);
}

/// Callback surface a transport uses to drive one connection attempt.
///
/// Every link carries the id of the attempt it was created for. Once the
/// socket starts a newer attempt, calls through an old link are ignored.
#[derive(Clone)]
pub struct TransportLink {
    socket: Socket,
    conn_id: u64,
}

impl TransportLink {
    pub(crate) fn new(socket: Socket, conn_id: u64) -> Self {
        Self { socket, conn_id }
    }

    /// The connection is writable. Frames queued on `outbound` must be sent.
    ///
    /// Returns `false` when the socket no longer wants this connection
    /// (superseded or disconnected while opening); the transport should close.
    pub fn opened(&self, outbound: UnboundedSender<String>) -> bool {
        self.socket.handle_open(self.conn_id, outbound)
    }

    /// A text frame arrived.
    pub fn received(&self, raw: &str) {
        self.socket.handle_text(self.conn_id, raw);
    }

    /// The connection is gone. Returns the delay before a reconnect attempt,
    /// or `None` when no reconnect should happen.
    pub fn closed(&self) -> Option<Duration> {
        self.socket.handle_close(self.conn_id)
    }

    /// Run one heartbeat tick.
    pub fn heartbeat(&self) -> Heartbeat {
        self.socket.heartbeat(self.conn_id)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.socket.heartbeat_interval()
    }

    /// Reconnect after a scheduled delay, unless the user or a newer attempt
    /// has taken over in the meantime.
    pub fn reconnect(&self) {
        self.socket.reconnect_after(self.conn_id);
    }

    pub fn is_current(&self) -> bool {
        self.socket.is_current(self.conn_id)
    }
}

/// Transport for builds without a browser: every attempt closes at once.
pub struct NullTransport;

impl Transport for NullTransport {
    fn open(&self, url: &str, link: TransportLink) {
        log::warn!("no websocket transport in this build; cannot open {url}");
        let _ = link.closed();
    }

    fn schedule(&self, delay: Duration, _task: Task) {
        log::debug!("no timers in this build; dropping task due in {}ms", delay.as_millis());
    }
}

/// Transport used by `use_chat`: the browser WebSocket when available.
pub fn default_transport() -> Arc<dyn Transport> {
    #[cfg(feature = "csr")]
    {
        Arc::new(WebSocketTransport)
    }
    #[cfg(not(feature = "csr"))]
    {
        Arc::new(NullTransport)
    }
}

/// Browser WebSocket transport built on gloo-net.
#[cfg(feature = "csr")]
pub struct WebSocketTransport;

#[cfg(feature = "csr")]
impl Transport for WebSocketTransport {
    fn open(&self, url: &str, link: TransportLink) {
        leptos::task::spawn_local(run_connection(url.to_owned(), link));
    }

    fn schedule(&self, delay: Duration, task: Task) {
        leptos::task::spawn_local(async move {
            gloo_timers::future::sleep(delay).await;
            task();
        });
    }
}

/// Drive one connection until it drops, then schedule a reconnect if asked.
#[cfg(feature = "csr")]
async fn run_connection(url: String, link: TransportLink) {
    use futures::SinkExt;
    use futures::future::poll_fn;
    use gloo_net::websocket::State;
    use gloo_net::websocket::futures::WebSocket;

    match WebSocket::open(&url) {
        Ok(mut ws) => {
            // `open` returns while the handshake is still in flight; the sink
            // turns ready once the browser socket leaves CONNECTING.
            let ready = poll_fn(|cx| ws.poll_ready_unpin(cx)).await;
            match (ready, ws.state()) {
                (Ok(()), State::Open) => run_open(ws, &link).await,
                (Err(e), _) => log::warn!("socket handshake failed for {url}: {e}"),
                (Ok(()), state) => log::warn!("socket for {url} never opened: {state:?}"),
            }
        }
        Err(e) => log::warn!("socket open failed for {url}: {e}"),
    }

    if let Some(delay) = link.closed() {
        log::debug!("reconnecting in {}ms", delay.as_millis());
        gloo_timers::future::sleep(delay).await;
        link.reconnect();
    }
}

/// Pump an open websocket until either side finishes.
#[cfg(feature = "csr")]
async fn run_open(ws: gloo_net::websocket::futures::WebSocket, link: &TransportLink) {
    use futures::future::{Either, select};
    use futures::{SinkExt, StreamExt};
    use gloo_net::websocket::Message;

    let (outbound, mut rx) = futures::channel::mpsc::unbounded::<String>();
    if !link.opened(outbound) {
        let _ = ws.close(None, None);
        return;
    }
    let (mut ws_write, mut ws_read) = ws.split();

    // Forward queued frames; ends when the socket drops its sender.
    let send_task = async {
        while let Some(text) = rx.next().await {
            if ws_write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_write.close().await;
    };

    let recv_task = async {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Text(text)) => link.received(&text),
                Ok(Message::Bytes(_)) => {}
                Err(e) => {
                    log::warn!("socket recv error: {e}");
                    break;
                }
            }
        }
    };

    let heartbeat_task = async {
        let interval = link.heartbeat_interval();
        loop {
            gloo_timers::future::sleep(interval).await;
            match link.heartbeat() {
                Heartbeat::Sent => {}
                Heartbeat::TimedOut => {
                    log::warn!("heartbeat timeout, closing socket");
                    break;
                }
                Heartbeat::Idle => {
                    if !link.is_current() {
                        break;
                    }
                }
            }
        }
    };

    let io = select(Box::pin(recv_task), Box::pin(heartbeat_task));
    match select(Box::pin(send_task), io).await {
        Either::Left(((), _)) => log::debug!("socket writer finished"),
        Either::Right(_) => log::debug!("socket reader finished"),
    }
}

//! Client configuration: socket endpoint, room, and connection policy.
//!
//! Defaults match the local development server. The browser entry point can
//! override the room and endpoint through the page query string
//! (`?room=lobby&socket=ws://host/socket`).

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:4000/socket";
pub const DEFAULT_ROOM_ID: &str = "123";
pub const DEFAULT_USERNAME: &str = "Guest";
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u32 = 30_000;
pub const DEFAULT_JOIN_TIMEOUT_MS: u32 = 10_000;
pub const DEFAULT_RECONNECT_BASE_MS: u32 = 1_000;
pub const DEFAULT_RECONNECT_MAX_MS: u32 = 10_000;

/// Backoff applied when the connection drops without a user request, and
/// when a room join fails while the socket stays open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub base_ms: u32,
    pub max_ms: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { enabled: true, base_ms: DEFAULT_RECONNECT_BASE_MS, max_ms: DEFAULT_RECONNECT_MAX_MS }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (zero-based).
    ///
    /// Doubles from `base_ms` and saturates at `max_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u32 {
        let factor = 1_u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatConfig {
    /// Socket base URL, without the `/websocket` suffix.
    pub endpoint: String,
    pub room_id: String,
    /// Params sent with every `phx_join`.
    pub join_params: serde_json::Value,
    pub default_username: String,
    pub heartbeat_interval_ms: u32,
    /// How long a `phx_join` may go unanswered before it is retried.
    pub join_timeout_ms: u32,
    pub reconnect: ReconnectPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            room_id: DEFAULT_ROOM_ID.to_owned(),
            join_params: serde_json::json!({}),
            default_username: DEFAULT_USERNAME.to_owned(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ChatConfig {
    /// Apply `room` and `socket` overrides from a URL query string.
    ///
    /// Accepts the string with or without the leading `?`. Unknown keys and
    /// empty values are ignored.
    #[must_use]
    pub fn with_query(mut self, query: &str) -> Self {
        for pair in query.trim_start_matches('?').split('&') {
            let Some((key, raw)) = pair.split_once('=') else {
                continue;
            };
            let raw = raw.replace('+', " ");
            let Ok(value) = urlencoding::decode(&raw) else {
                log::warn!("ignoring undecodable query value for {key}");
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "room" => value.clone_into(&mut self.room_id),
                "socket" => value.trim_end_matches('/').clone_into(&mut self.endpoint),
                _ => {}
            }
        }
        self
    }

    /// Build config from defaults plus the current page's query string.
    pub fn from_location() -> Self {
        #[cfg(feature = "csr")]
        {
            let query = web_sys::window()
                .and_then(|w| w.location().search().ok())
                .unwrap_or_default();
            Self::default().with_query(&query)
        }
        #[cfg(not(feature = "csr"))]
        {
            Self::default()
        }
    }

    /// Channel topic for the configured room.
    pub fn topic(&self) -> String {
        room_topic(&self.room_id)
    }
}

/// Topic string for a room identifier.
pub fn room_topic(room_id: &str) -> String {
    format!("room:{room_id}")
}

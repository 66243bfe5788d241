//! Wire-protocol DTOs for the Phoenix channels V2 JSON serializer.
//!
//! DESIGN
//! ======
//! Every frame on the socket is a five-element JSON array
//! `[join_ref, ref, topic, event, payload]`. `Message` keeps the fields named
//! in Rust and maps them to the positional form at the serde boundary.
//! Payload structs mirror what the room channel sends and expects.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ChatError;

/// Protocol version appended to the socket URL.
pub const PROTOCOL_VSN: &str = "2.0.0";

/// Topic used for socket-level traffic such as heartbeats.
pub const PHOENIX_TOPIC: &str = "phoenix";

pub const PHX_JOIN: &str = "phx_join";
pub const PHX_LEAVE: &str = "phx_leave";
pub const PHX_REPLY: &str = "phx_reply";
pub const PHX_ERROR: &str = "phx_error";
pub const PHX_CLOSE: &str = "phx_close";
pub const HEARTBEAT: &str = "heartbeat";

pub const PRESENCE_STATE: &str = "presence_state";
pub const PRESENCE_DIFF: &str = "presence_diff";

/// Inbound: a chat message broadcast to the room.
pub const MESSAGE_NEW: &str = "message:new";
/// Outbound: post a chat message.
pub const MESSAGE_ADD: &str = "message:add";
/// Outbound: change this connection's display name.
pub const CHANGE_USERNAME: &str = "change:username";

/// A single frame on the socket.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Join reference of the channel instance the frame belongs to.
    pub join_ref: Option<String>,
    /// Per-push reference used to correlate `phx_reply` frames.
    pub msg_ref: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

type WireMessage = (Option<String>, Option<String>, String, String, Value);

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.join_ref, &self.msg_ref, &self.topic, &self.event, &self.payload).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (join_ref, msg_ref, topic, event, payload) = WireMessage::deserialize(deserializer)?;
        Ok(Self { join_ref, msg_ref, topic, event, payload })
    }
}

impl Message {
    /// Encode for the wire.
    pub fn encode(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(ChatError::Encode)
    }

    /// Decode one text frame.
    pub fn decode(raw: &str) -> Result<Self, ChatError> {
        serde_json::from_str(raw).map_err(ChatError::Decode)
    }

    /// Deserialize the payload into a typed struct.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, ChatError> {
        T::deserialize(&self.payload).map_err(ChatError::Decode)
    }
}

/// Payload of a `phx_reply` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: String,
    #[serde(default)]
    pub response: Value,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Inbound `message:new` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub username: String,
    pub message: String,
}

/// Outbound `message:add` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMessage {
    pub message: String,
}

/// Outbound `change:username` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeUsername {
    pub username: String,
}

/// One connection's metadata inside a presence entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceMeta {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub color: String,
    /// Online-since timestamp. Servers send either a string or an integer.
    #[serde(default, deserialize_with = "deserialize_string_from_scalar")]
    pub online_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phx_ref: Option<String>,
    /// Any further fields the server tracks.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// All metas tracked under one presence key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceMetas {
    #[serde(default)]
    pub metas: Vec<PresenceMeta>,
}

/// `presence_state` payload: key to metas.
pub type PresenceStatePayload = BTreeMap<String, PresenceMetas>;

/// `presence_diff` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceDiffPayload {
    #[serde(default)]
    pub joins: PresenceStatePayload,
    #[serde(default)]
    pub leaves: PresenceStatePayload,
}

fn deserialize_string_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!("expected string or number, got {other}"))),
    }
}

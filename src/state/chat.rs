#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use serde_json::Value;

use crate::net::types::NewMessage;

/// A single chat message as displayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub username: String,
    pub message: String,
}

impl From<NewMessage> for ChatMessage {
    fn from(msg: NewMessage) -> Self {
        Self { username: msg.username, message: msg.message }
    }
}

/// Append-only message history for the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageHistory {
    pub messages: Vec<ChatMessage>,
}

impl MessageHistory {
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Append a `message:new` payload. Returns false if it was malformed.
    pub fn apply_payload(&mut self, payload: &Value) -> bool {
        match serde_json::from_value::<NewMessage>(payload.clone()) {
            Ok(msg) => {
                self.push(msg.into());
                true
            }
            Err(e) => {
                log::warn!("dropping malformed message:new: {e}");
                false
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

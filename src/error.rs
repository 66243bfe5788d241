//! Error type shared by the socket, channel and coordinator layers.
//!
//! ERROR HANDLING
//! ==============
//! Every failure here is recoverable from the UI's point of view: pushes are
//! best effort, malformed inbound frames are dropped, and connection loss is
//! reflected through `SocketState` rather than surfaced as an error.

/// Errors produced by the realtime client.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The socket has no live connection to push through.
    #[error("socket is not connected")]
    NotConnected,
    /// A push was attempted on a channel that has not finished joining.
    #[error("channel {topic} is not joined")]
    NotJoined { topic: String },
    /// No room has been selected yet.
    #[error("no room selected")]
    NoRoom,
    /// An outbound payload could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    /// An inbound frame or payload did not match the expected shape.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    /// The underlying transport refused or lost the connection.
    #[error("transport error: {0}")]
    Transport(String),
}

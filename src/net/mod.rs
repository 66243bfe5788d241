//! Realtime client bindings: socket, channels and presence.
//!
//! SYSTEM CONTEXT
//! ==============
//! `types` defines the wire schema, `socket` owns the connection lifecycle,
//! `channel` scopes traffic to a topic, `presence` folds roster updates and
//! `transport` is the seam to the browser WebSocket.

pub mod channel;
pub mod presence;
pub mod socket;
pub mod subscription;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

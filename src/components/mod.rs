//! Chat UI components.
//!
//! SYSTEM CONTEXT
//! ==============
//! `ChatWindow` creates the chat handle with `use_chat` and provides it as
//! context; every other component reads it with `expect_context::<UseChat>()`
//! and keeps its own view state in local signals.

pub mod chat_history;
pub mod chat_window;
pub mod connection_controls;
pub mod message_composer;
pub mod online_users;
pub mod username_editor;

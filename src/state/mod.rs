//! Pure models behind each view unit.
//!
//! DESIGN
//! ======
//! Components own these as `RwSignal` values and call into them on input.
//! Keeping the decisions here (what to publish, in what order to render)
//! lets them be tested without a DOM.

pub mod chat;
pub mod composer;
pub mod connection;
pub mod roster;
pub mod username;

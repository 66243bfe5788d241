//! # roomchat
//!
//! Leptos + WASM browser client for a Phoenix channels chat room.
//!
//! The `net` module speaks the Phoenix V2 socket protocol (socket, channel,
//! presence). `coordinator` composes them for a single room and exposes the
//! `use_chat` hook. `state` holds the pure view models and `components` the
//! Leptos views built on top of them.

pub mod app;
pub mod components;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod net;
pub mod state;

/// Browser entry point.
#[cfg(feature = "csr")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Debug);
    leptos::mount::mount_to_body(app::App);
}

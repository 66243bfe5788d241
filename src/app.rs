//! Root application component.

use leptos::prelude::*;

use crate::components::chat_window::ChatWindow;
use crate::config::ChatConfig;

/// Root component. Reads configuration from the page URL and mounts one chat
/// window for the configured room.
#[component]
pub fn App() -> impl IntoView {
    let config = ChatConfig::from_location();
    let room_id = RwSignal::new(config.room_id.clone());

    view! {
        <div class="chat-app">
            <ChatWindow config=config room_id=room_id/>
        </div>
    }
}

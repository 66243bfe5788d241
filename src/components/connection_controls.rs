//! Connect / disconnect buttons and the socket status label.

use leptos::prelude::*;

use crate::coordinator::UseChat;
use crate::state::connection::controls_for;

#[component]
pub fn ConnectionControls() -> impl IntoView {
    let chat = expect_context::<UseChat>();
    let socket_state = chat.socket_state;
    let controls = move || controls_for(socket_state.get());

    let on_disconnect = {
        let chat = chat.clone();
        move |_| chat.disconnect()
    };
    let on_connect = move |_| chat.connect();

    view! {
        <div class="connection-controls">
            <div class="connection-controls__buttons">
                <button
                    class="btn connection-controls__disconnect"
                    disabled=move || controls().disconnect_disabled
                    on:click=on_disconnect
                >
                    "Disconnect"
                </button>
                <button
                    class="btn connection-controls__connect"
                    disabled=move || controls().connect_disabled
                    on:click=on_connect
                >
                    "Connect"
                </button>
            </div>
            <span class="connection-controls__status">{move || controls().label}</span>
        </div>
    }
}

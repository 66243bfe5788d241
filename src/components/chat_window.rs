//! One room's chat surface: controls, history, inputs and roster.

use leptos::prelude::*;

use crate::components::chat_history::ChatHistory;
use crate::components::connection_controls::ConnectionControls;
use crate::components::message_composer::MessageComposer;
use crate::components::online_users::OnlineUsers;
use crate::components::username_editor::UsernameEditor;
use crate::config::ChatConfig;
use crate::coordinator::use_chat;
use crate::net::channel::ChannelState;

/// Chat window bound to `room_id`. Its border shows whether the room channel
/// is joined.
#[component]
pub fn ChatWindow(config: ChatConfig, #[prop(into)] room_id: Signal<String>) -> impl IntoView {
    let chat = use_chat(&config, room_id);
    let channel_state = chat.channel_state;
    provide_context(chat);

    let window_class = move || {
        if channel_state.get() == ChannelState::Joined {
            "chat-window chat-window--joined"
        } else {
            "chat-window chat-window--detached"
        }
    };

    view! {
        <ConnectionControls/>
        <div class=window_class>
            <div class="chat-window__main">
                <ChatHistory/>
                <div class="chat-window__inputs">
                    <UsernameEditor initial=config.default_username.clone()/>
                    <MessageComposer/>
                </div>
            </div>
            <OnlineUsers/>
        </div>
    }
}

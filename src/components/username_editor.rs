//! Display name input; every non-blank edit is announced to the room.

use leptos::prelude::*;

use crate::coordinator::UseChat;
use crate::net::types::CHANGE_USERNAME;
use crate::state::username::UsernameState;

#[component]
pub fn UsernameEditor(#[prop(into)] initial: String) -> impl IntoView {
    let chat = expect_context::<UseChat>();
    let state = RwSignal::new(UsernameState::new(&initial));

    let on_input = move |ev| {
        let next = event_target_value(&ev);
        let mut changed = None;
        state.update(|s| changed = s.change(&next));
        if let Some(payload) = changed {
            chat.publish(CHANGE_USERNAME, &payload);
        }
    };

    view! {
        <div class="username-editor">
            <input
                class="username-editor__input"
                type="text"
                placeholder=move || state.get().username
                prop:value=move || state.get().username
                on:input=on_input
            />
        </div>
    }
}

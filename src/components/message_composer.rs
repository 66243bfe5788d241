//! Message draft input with Enter / Send submission.

use leptos::prelude::*;

use crate::coordinator::UseChat;
use crate::net::types::MESSAGE_ADD;
use crate::state::composer::Draft;

#[component]
pub fn MessageComposer() -> impl IntoView {
    let chat = expect_context::<UseChat>();
    let draft = RwSignal::new(Draft::default());

    let do_send = move || {
        let mut submitted = None;
        draft.update(|d| submitted = d.submit());
        if let Some(payload) = submitted {
            chat.publish(MESSAGE_ADD, &payload);
        }
    };

    let on_click = {
        let do_send = do_send.clone();
        move |_| do_send()
    };

    let on_keydown = move |ev: leptos::ev::KeyboardEvent| {
        if ev.key() == "Enter" {
            ev.prevent_default();
            do_send();
        }
    };

    view! {
        <div class="message-composer">
            <input
                class="message-composer__input"
                type="text"
                placeholder="New Message"
                prop:value=move || draft.get().text
                on:input=move |ev| draft.update(|d| d.text = event_target_value(&ev))
                on:keydown=on_keydown
            />
            <button class="btn btn--primary message-composer__send" on:click=on_click>
                "Send"
            </button>
        </div>
    }
}

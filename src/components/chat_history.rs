//! Scrolling list of `message:new` broadcasts received this session.

use leptos::prelude::*;

use crate::coordinator::UseChat;
use crate::net::types::MESSAGE_NEW;
use crate::state::chat::MessageHistory;

#[component]
pub fn ChatHistory() -> impl IntoView {
    let chat = expect_context::<UseChat>();
    let history = RwSignal::new(MessageHistory::default());
    let messages_ref = NodeRef::<leptos::html::Div>::new();

    let subscription = chat.on_event(MESSAGE_NEW, move |payload| {
        history.update(|h| {
            h.apply_payload(payload);
        });
    });
    on_cleanup(move || chat.off(subscription));

    Effect::new(move || {
        let _ = history.with(MessageHistory::len);

        #[cfg(feature = "csr")]
        {
            if let Some(el) = messages_ref.get() {
                let scroll_height = el.scroll_height();
                el.set_scroll_top(scroll_height);
            }
        }
    });

    // History is append-only, so an index identifies a row for good.
    view! {
        <div class="chat-history" node_ref=messages_ref>
            <For each=move || 0..history.with(MessageHistory::len) key=|index| *index let:index>
                {history
                    .with_untracked(|h| h.get(index).cloned())
                    .map(|msg| {
                        view! {
                            <div class="chat-history__message">
                                <span class="chat-history__author">{format!("{}: ", msg.username)}</span>
                                <span class="chat-history__text">{msg.message}</span>
                            </div>
                        }
                    })}
            </For>
        </div>
    }
}

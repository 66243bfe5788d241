//! Presence roster, oldest connection first.

use leptos::prelude::*;

use crate::coordinator::UseChat;
use crate::state::roster::{OnlineUser, sort_roster, swatch_style};

/// Every snapshot rebuilds the rows, so a name or color change under an
/// existing presence key shows up.
#[component]
pub fn OnlineUsers() -> impl IntoView {
    let chat = expect_context::<UseChat>();
    let users = RwSignal::new(Vec::<OnlineUser>::new());

    let subscription = chat.on_presence_sync(move |roster| users.set(sort_roster(roster)));
    on_cleanup(move || chat.off(subscription));

    view! {
        <div class="online-users">
            <div class="online-users__title">"Online Users"</div>
            {move || {
                users
                    .get()
                    .into_iter()
                    .map(|user| {
                        let swatch = swatch_style(&user.color);
                        view! {
                            <div class="online-users__row">
                                <div class="online-users__swatch" style=swatch>
                                    "\u{a0}"
                                </div>
                                <span class="online-users__name">{user.username}</span>
                            </div>
                        }
                    })
                    .collect::<Vec<_>>()
            }}
        </div>
    }
}

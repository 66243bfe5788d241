//! Online users list model.

#[cfg(test)]
#[path = "roster_test.rs"]
mod roster_test;

use crate::net::presence::PresenceEntry;

/// One row of the online users list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnlineUser {
    /// Presence key; stable across renders.
    pub key: String,
    pub username: String,
    pub color: String,
    pub online_at: String,
}

/// Display rows for a roster snapshot, oldest connection first.
///
/// Uses each entry's first meta. Entries without metas are skipped; ties keep
/// snapshot order.
pub fn sort_roster(entries: &[PresenceEntry]) -> Vec<OnlineUser> {
    let mut users = entries
        .iter()
        .filter_map(|entry| {
            let meta = entry.first_meta()?;
            Some(OnlineUser {
                key: entry.key.clone(),
                username: meta.username.clone(),
                color: meta.color.clone(),
                online_at: meta.online_at.clone(),
            })
        })
        .collect::<Vec<_>>();
    users.sort_by(|a, b| a.online_at.cmp(&b.online_at));
    users
}

/// Inline style for a user's color swatch.
pub fn swatch_style(color: &str) -> String {
    format!("background-color: {color}")
}

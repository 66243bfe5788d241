#[cfg(test)]
#[path = "username_test.rs"]
mod username_test;

use crate::net::types::ChangeUsername;

/// Display name held by the username editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsernameState {
    pub username: String,
}

impl UsernameState {
    pub fn new(initial: &str) -> Self {
        Self { username: initial.to_owned() }
    }

    /// Accept an edit. An empty name is ignored; anything else replaces the
    /// current name and yields the payload to publish.
    pub fn change(&mut self, next: &str) -> Option<ChangeUsername> {
        if next.is_empty() {
            return None;
        }
        next.clone_into(&mut self.username);
        Some(ChangeUsername { username: next.to_owned() })
    }
}

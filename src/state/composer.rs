#[cfg(test)]
#[path = "composer_test.rs"]
mod composer_test;

use crate::net::types::AddMessage;

/// Draft text of the message composer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
}

impl Draft {
    pub fn can_submit(&self) -> bool {
        !self.text.is_empty()
    }

    /// Take the draft for publishing and clear it. An empty draft yields
    /// nothing.
    pub fn submit(&mut self) -> Option<AddMessage> {
        if !self.can_submit() {
            return None;
        }
        Some(AddMessage { message: std::mem::take(&mut self.text) })
    }
}

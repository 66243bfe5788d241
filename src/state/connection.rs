#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use crate::net::socket::SocketState;

/// Enabled state and label of the connect/disconnect controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlState {
    pub connect_disabled: bool,
    pub disconnect_disabled: bool,
    pub label: &'static str,
}

pub fn controls_for(state: SocketState) -> ControlState {
    let open = state == SocketState::Open;
    ControlState { connect_disabled: open, disconnect_disabled: !open, label: state.label() }
}

use std::time::Duration;

use super::*;
use crate::config::ChatConfig;
use crate::net::socket::SocketState;
use crate::net::testing::{MemoryTransport, broadcast, frame, memory_socket, memory_socket_with, reply_to};
use crate::net::types::{MESSAGE_ADD, MESSAGE_NEW};

// =============================================================
// Helpers
// =============================================================

fn open_socket() -> (Socket, Arc<MemoryTransport>) {
    let (socket, transport) = memory_socket();
    socket.connect();
    transport.accept();
    (socket, transport)
}

/// Join `topic` on an open socket and acknowledge the join.
fn joined_channel(socket: &Socket, transport: &MemoryTransport, topic: &str) -> Channel {
    let channel = socket.channel(topic, serde_json::json!({}));
    channel.join();
    let sent = transport.sent();
    let join = sent.iter().find(|m| m.event == PHX_JOIN).expect("join pushed");
    transport.deliver(&reply_to(join, "ok"));
    assert_eq!(channel.state(), ChannelState::Joined);
    channel
}

fn collect_payloads(channel: &Channel, event: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    channel.on(event, move |payload| sink.lock().push(payload.clone()));
    seen
}

// =============================================================
// Join lifecycle
// =============================================================

#[test]
fn join_sends_phx_join_with_params_and_matching_refs() {
    let (socket, transport) = open_socket();
    let channel = socket.channel("room:123", serde_json::json!({"token": "abc"}));
    channel.join();

    assert_eq!(channel.state(), ChannelState::Joining);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, PHX_JOIN);
    assert_eq!(sent[0].topic, "room:123");
    assert_eq!(sent[0].payload, serde_json::json!({"token": "abc"}));
    assert_eq!(sent[0].join_ref, sent[0].msg_ref);
    assert_eq!(sent[0].join_ref, channel.join_ref());
}

#[test]
fn ok_reply_marks_channel_joined() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    assert_eq!(channel.state().label(), "Joined");
}

#[test]
fn error_reply_marks_channel_errored() {
    let (socket, transport) = open_socket();
    let channel = socket.channel("room:123", serde_json::json!({}));
    channel.join();
    let sent = transport.sent();
    transport.deliver(&reply_to(&sent[0], "error"));
    assert_eq!(channel.state(), ChannelState::Errored);
}

#[test]
fn join_before_socket_open_waits_then_sends_on_open() {
    let (socket, transport) = memory_socket();
    let channel = socket.channel("room:123", serde_json::json!({}));
    channel.join();
    assert_eq!(channel.state(), ChannelState::Joining);

    socket.connect();
    transport.accept();
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, PHX_JOIN);
}

#[test]
fn socket_close_errors_channel_and_reopen_rejoins_with_fresh_ref() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let first_ref = channel.join_ref();

    let _ = transport.drop_connection();
    assert_eq!(channel.state(), ChannelState::Errored);

    transport.link().reconnect();
    transport.accept();
    assert_eq!(socket.state(), SocketState::Open);
    assert_eq!(channel.state(), ChannelState::Joining);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_ne!(sent[0].join_ref, first_ref);
}

#[test]
fn phx_error_and_phx_close_update_state() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    transport.deliver(&broadcast("room:123", PHX_ERROR, serde_json::json!({})));
    assert_eq!(channel.state(), ChannelState::Errored);
    transport.deliver(&broadcast("room:123", PHX_CLOSE, serde_json::json!({})));
    assert_eq!(channel.state(), ChannelState::Closed);
}

// =============================================================
// Rejoin while the socket stays open
// =============================================================

const FIRST_RETRY: Duration = Duration::from_millis(1_000);
const JOIN_TIMEOUT: Duration = Duration::from_millis(10_000);

#[test]
fn phx_error_while_open_rejoins_after_backoff() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let first_ref = channel.join_ref();

    transport.deliver(&broadcast("room:123", PHX_ERROR, serde_json::json!({})));
    assert_eq!(channel.state(), ChannelState::Errored);
    assert!(transport.sent().is_empty());
    assert!(transport.timer_delays().contains(&FIRST_RETRY));

    transport.fire(FIRST_RETRY);
    assert_eq!(channel.state(), ChannelState::Joining);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, PHX_JOIN);
    assert_ne!(sent[0].join_ref, first_ref);

    transport.deliver(&reply_to(&sent[0], "ok"));
    assert_eq!(channel.state(), ChannelState::Joined);
    channel.push(MESSAGE_ADD, &serde_json::json!({"message": "back"})).unwrap();
}

#[test]
fn refused_join_retries_with_growing_delay() {
    let (socket, transport) = open_socket();
    let channel = socket.channel("room:123", serde_json::json!({}));
    channel.join();
    let sent = transport.sent();
    transport.deliver(&reply_to(&sent[0], "error"));
    assert!(transport.timer_delays().contains(&FIRST_RETRY));

    transport.fire(FIRST_RETRY);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    transport.deliver(&reply_to(&sent[0], "error"));
    assert_eq!(channel.state(), ChannelState::Errored);
    assert!(transport.timer_delays().contains(&Duration::from_millis(2_000)));
}

#[test]
fn unanswered_join_times_out_and_retries() {
    let (socket, transport) = open_socket();
    let channel = socket.channel("room:123", serde_json::json!({}));
    channel.join();
    let _ = transport.sent();

    transport.fire(JOIN_TIMEOUT);
    assert_eq!(channel.state(), ChannelState::Errored);

    transport.fire(FIRST_RETRY);
    assert_eq!(channel.state(), ChannelState::Joining);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, PHX_JOIN);
}

#[test]
fn answered_join_ignores_its_timeout() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    transport.fire(JOIN_TIMEOUT);
    assert_eq!(channel.state(), ChannelState::Joined);
    assert!(transport.sent().is_empty());
}

#[test]
fn left_channel_ignores_pending_rejoin() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    transport.deliver(&broadcast("room:123", PHX_ERROR, serde_json::json!({})));
    channel.leave();
    let _ = transport.sent();

    transport.fire(FIRST_RETRY);
    assert!(transport.sent().is_empty());
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[test]
fn rejoin_disabled_by_config() {
    let mut config = ChatConfig::default();
    config.reconnect.enabled = false;
    let (socket, transport) = memory_socket_with(&config);
    socket.connect();
    transport.accept();
    let channel = joined_channel(&socket, &transport, "room:123");

    transport.deliver(&broadcast("room:123", PHX_ERROR, serde_json::json!({})));
    assert_eq!(channel.state(), ChannelState::Errored);
    assert!(!transport.timer_delays().contains(&FIRST_RETRY));
}

// =============================================================
// Inbound events
// =============================================================

#[test]
fn handlers_fire_once_per_event_in_arrival_order() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let seen = collect_payloads(&channel, MESSAGE_NEW);

    for i in 0..3 {
        transport.deliver(&broadcast("room:123", MESSAGE_NEW, serde_json::json!({"n": i})));
    }
    transport.deliver(&broadcast("room:123", "other", serde_json::json!({"n": 99})));

    let payloads = seen.lock().iter().map(|p| p["n"].as_i64().unwrap()).collect::<Vec<_>>();
    assert_eq!(payloads, vec![0, 1, 2]);
}

#[test]
fn frames_for_other_topics_are_not_delivered() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let seen = collect_payloads(&channel, MESSAGE_NEW);
    transport.deliver(&broadcast("room:999", MESSAGE_NEW, serde_json::json!({})));
    assert!(seen.lock().is_empty());
}

#[test]
fn frames_with_stale_join_ref_are_dropped() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let seen = collect_payloads(&channel, MESSAGE_NEW);
    transport.deliver(&frame(Some("stale"), None, "room:123", MESSAGE_NEW, serde_json::json!({})));
    assert!(seen.lock().is_empty());

    let current = channel.join_ref();
    transport.deliver(&frame(current.as_deref(), None, "room:123", MESSAGE_NEW, serde_json::json!({})));
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn off_stops_delivery() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);
    let id = channel.on(MESSAGE_NEW, move |_| *sink.lock() += 1);
    assert!(channel.off(id));
    transport.deliver(&broadcast("room:123", MESSAGE_NEW, serde_json::json!({})));
    assert_eq!(*seen.lock(), 0);
}

#[test]
fn handler_may_push_without_deadlock() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let echo = channel.clone();
    channel.on(MESSAGE_NEW, move |payload| {
        let _ = echo.push(MESSAGE_ADD, payload);
    });
    transport.deliver(&broadcast("room:123", MESSAGE_NEW, serde_json::json!({"message": "hi"})));
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, MESSAGE_ADD);
}

// =============================================================
// Push
// =============================================================

#[test]
fn push_requires_joined_channel() {
    let (socket, _transport) = open_socket();
    let channel = socket.channel("room:123", serde_json::json!({}));
    let err = channel.push(MESSAGE_ADD, &serde_json::json!({"message": "hi"})).unwrap_err();
    assert!(matches!(err, ChatError::NotJoined { ref topic } if topic == "room:123"));
}

#[test]
fn push_carries_join_ref_topic_and_payload() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    channel.push(MESSAGE_ADD, &serde_json::json!({"message": "hello"})).unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, MESSAGE_ADD);
    assert_eq!(sent[0].topic, "room:123");
    assert_eq!(sent[0].join_ref, channel.join_ref());
    assert_eq!(sent[0].payload, serde_json::json!({"message": "hello"}));
}

// =============================================================
// Leave
// =============================================================

#[test]
fn leave_sends_phx_leave_and_silences_handlers() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    let seen = collect_payloads(&channel, MESSAGE_NEW);
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    channel.on_state_change(move |state| sink.lock().push(state));

    channel.leave();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(*states.lock(), vec![ChannelState::Leaving, ChannelState::Closed]);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event, PHX_LEAVE);

    transport.deliver(&broadcast("room:123", MESSAGE_NEW, serde_json::json!({})));
    assert!(seen.lock().is_empty());
}

#[test]
fn left_channel_is_not_rejoined_on_reconnect() {
    let (socket, transport) = open_socket();
    let channel = joined_channel(&socket, &transport, "room:123");
    channel.leave();
    let _ = transport.sent();

    let _ = transport.drop_connection();
    transport.link().reconnect();
    transport.accept();
    assert!(transport.sent().is_empty());
    assert_eq!(channel.state(), ChannelState::Closed);
}

use chopin::channel::{ChannelRouter, EventContext, JoinResult};
use chopin::testing::ChannelTestHarness;
use serde_json::Value;
use std::sync::Arc;

fn allow_join(_ctx: &EventContext, _topic: &str, _payload: &Value) -> JoinResult {
    JoinResult::Ok
}

fn deny_join(_ctx: &EventContext, _topic: &str, _payload: &Value) -> JoinResult {
    JoinResult::Error(serde_json::json!({ "reason": "not authorized" }))
}

fn echo(ctx: &EventContext, _topic: &str, payload: &Value) {
    ctx.reply("ok", payload.clone());
}

fn push_greeting(ctx: &EventContext, topic: &str, _payload: &Value) {
    ctx.push(topic, "greeting", serde_json::json!({"text": "welcome"}));
}

// ═══ join / leave ═══

#[test]
fn test_successful_join_replies_ok() {
    let mut router = ChannelRouter::new();
    router.channel("room:lobby", allow_join);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    let frames = harness.join("room:lobby", Value::Object(Default::default()));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event, "phx_reply");
    assert_eq!(frames[0].payload["status"], "ok");
}

#[test]
fn test_denied_join_replies_error_and_blocks_further_events() {
    let mut router = ChannelRouter::new();
    router.channel("room:vip", deny_join).on_event("echo", echo);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    let frames = harness.join("room:vip", Value::Object(Default::default()));
    assert_eq!(frames[0].event, "phx_reply");
    assert_eq!(frames[0].payload["status"], "error");

    let frames = harness.push("room:vip", "echo", serde_json::json!({"n": 1}));
    assert!(frames.is_empty(), "a denied join must not let custom events through");
}

#[test]
fn test_leave_allows_rejoin() {
    let mut router = ChannelRouter::new();
    router.channel("room:lobby", allow_join);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    harness.join("room:lobby", Value::Object(Default::default()));
    let leave_frames = harness.leave("room:lobby");
    assert_eq!(leave_frames[0].event, "phx_reply");

    let rejoin_frames = harness.join("room:lobby", Value::Object(Default::default()));
    assert_eq!(rejoin_frames[0].payload["status"], "ok");
}

// ═══ custom events ═══

#[test]
fn test_custom_event_handler_replies_with_echoed_payload() {
    let mut router = ChannelRouter::new();
    router.channel("room:lobby", allow_join).on_event("echo", echo);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    harness.join("room:lobby", Value::Object(Default::default()));
    let frames = harness.push("room:lobby", "echo", serde_json::json!({"n": 42}));
    assert_eq!(frames[0].payload["response"]["n"], 42);
}

#[test]
fn test_event_context_push_sends_a_server_initiated_message() {
    let mut router = ChannelRouter::new();
    router.channel("room:lobby", allow_join).on_event("hello", push_greeting);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    harness.join("room:lobby", Value::Object(Default::default()));
    let frames = harness.push("room:lobby", "hello", Value::Object(Default::default()));
    assert!(frames.iter().any(|f| f.event == "greeting" && f.payload["text"] == "welcome"));
}

#[test]
fn test_event_on_unmatched_topic_is_silently_ignored() {
    let mut router = ChannelRouter::new();
    router.channel("room:lobby", allow_join).on_event("echo", echo);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    // No join was ever sent for this topic.
    let frames = harness.push("room:lobby", "echo", serde_json::json!({}));
    assert!(frames.is_empty());
}

// ═══ topic patterns ═══

#[test]
fn test_prefix_pattern_matches_any_room_under_it() {
    let mut router = ChannelRouter::new();
    router.channel("room:*", allow_join).on_event("echo", echo);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    let frames = harness.join("room:anything-goes", Value::Object(Default::default()));
    assert_eq!(frames[0].payload["status"], "ok");
}

#[test]
fn test_join_to_unmatched_topic_is_an_error_reply() {
    let mut router = ChannelRouter::new();
    router.channel("room:lobby", allow_join);
    let mut harness = ChannelTestHarness::new(Arc::new(router), 1);

    let frames = harness.join("room:other", Value::Object(Default::default()));
    assert_eq!(frames[0].payload["status"], "error");
}

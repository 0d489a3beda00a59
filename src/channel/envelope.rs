//! Phoenix-compatible JSON envelope: `{"topic", "event", "payload", "ref"}`.
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_HEARTBEAT: &str = "heartbeat";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ref")]
    pub msg_ref: Option<String>,
}

impl Envelope {
    pub fn reply(topic: &str, msg_ref: Option<String>, status: &str, response: Value) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_REPLY.to_string(),
            payload: serde_json::json!({ "status": status, "response": response }),
            msg_ref,
        }
    }

    pub fn broadcast(topic: &str, event: &str, payload: Value) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            msg_ref: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

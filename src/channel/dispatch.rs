//! Routes channel-protocol JSON envelopes to the matching [`ChannelDef`].
//! Implements [`FrameHandler`] so it plugs directly into the WebSocket
//! connection loop.
use super::broker::Broker;
use super::definition::{ChannelDef, ChannelDefHandle, JoinFn, JoinResult, new_def};
use super::envelope::{EVENT_HEARTBEAT, EVENT_JOIN, EVENT_LEAVE, Envelope};
use super::socket::Socket;
use crate::ws::{Frame, FrameHandler, Message, WsSender};
use serde_json::Value;
use std::sync::Arc;

/// The compiled table of channel definitions, shared read-only across every
/// connection. A message is delivered to at most one channel definition:
/// the first whose pattern matches the topic.
#[derive(Default)]
pub struct ChannelRouter {
    defs: Vec<ChannelDef>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&mut self, pattern: &str, join: JoinFn) -> ChannelDefHandle<'_> {
        self.defs.push(new_def(pattern, join));
        let idx = self.defs.len() - 1;
        ChannelDefHandle {
            defs: &mut self.defs,
            idx,
        }
    }

    fn find(&self, topic: &str) -> Option<&ChannelDef> {
        self.defs.iter().find(|d| d.pattern.matches(topic))
    }
}

/// Per-connection channel dispatcher: owns the [`Socket`] and a shared
/// reference to the [`ChannelRouter`] and [`Broker`].
pub struct ChannelDispatcher {
    router: Arc<ChannelRouter>,
    broker: Arc<Broker>,
    socket: Socket,
}

impl ChannelDispatcher {
    pub fn new(router: Arc<ChannelRouter>, broker: Arc<Broker>, id: u64, sender: Arc<dyn WsSender>) -> Self {
        broker.register(id, sender.clone());
        Self {
            router,
            broker,
            socket: Socket::new(id, sender),
        }
    }

    fn send(&self, envelope: &Envelope) {
        let _ = self.socket.sender.send(&Frame::text(envelope.to_json()));
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope.event.as_str() {
            EVENT_JOIN => self.handle_join(envelope),
            EVENT_LEAVE => self.handle_leave(envelope),
            EVENT_HEARTBEAT => {
                self.send(&Envelope::reply(&envelope.topic, envelope.msg_ref, "ok", Value::Object(Default::default())));
            }
            _ => self.handle_custom(envelope),
        }
    }

    fn handle_join(&mut self, envelope: Envelope) {
        let Some(def) = self.router.find(&envelope.topic) else {
            self.reply_error(&envelope.topic, envelope.msg_ref, "unmatched topic");
            return;
        };
        let ctx = EventContext::new(&self.socket, &self.broker, &envelope.topic, None);
        match (def.join)(&ctx, &envelope.topic, &envelope.payload) {
            JoinResult::Ok => {
                if self.socket.join(&envelope.topic) {
                    self.broker.subscribe(&envelope.topic, self.socket.id);
                    self.send(&Envelope::reply(&envelope.topic, envelope.msg_ref, "ok", Value::Object(Default::default())));
                } else {
                    self.reply_error(&envelope.topic, envelope.msg_ref, "too many joined topics");
                }
            }
            JoinResult::Error(detail) => {
                self.send(&Envelope::reply(&envelope.topic, envelope.msg_ref, "error", detail));
            }
        }
    }

    fn handle_leave(&mut self, envelope: Envelope) {
        if let Some(def) = self.router.find(&envelope.topic) {
            if let Some(leave) = def.leave {
                let ctx = EventContext::new(&self.socket, &self.broker, &envelope.topic, None);
                leave(&ctx, &envelope.topic);
            }
        }
        self.socket.leave(&envelope.topic);
        self.broker.unsubscribe(&envelope.topic, self.socket.id);
        self.send(&Envelope::reply(&envelope.topic, envelope.msg_ref, "ok", Value::Object(Default::default())));
    }

    fn handle_custom(&mut self, envelope: Envelope) {
        if !self.socket.is_joined(&envelope.topic) {
            return;
        }
        let Some(def) = self.router.find(&envelope.topic) else {
            return;
        };
        let Some(handler) = def.handler_for(&envelope.event) else {
            return;
        };
        let ctx = EventContext::new(&self.socket, &self.broker, &envelope.topic, envelope.msg_ref);
        handler(&ctx, &envelope.topic, &envelope.payload);
    }

    fn reply_error(&self, topic: &str, msg_ref: Option<String>, reason: &str) {
        self.send(&Envelope::reply(topic, msg_ref, "error", serde_json::json!({ "reason": reason })));
    }
}

impl FrameHandler for ChannelDispatcher {
    fn on_message(&mut self, _sender: &dyn WsSender, message: Message) {
        let Message::Text(text) = message else {
            return;
        };
        match Envelope::parse(&text) {
            Ok(envelope) => self.handle_envelope(envelope),
            Err(e) => tracing::debug!(error = %e, "dropping malformed channel envelope"),
        }
    }

    fn on_close(&mut self, _code: u16, _reason: &str) {
        self.broker.unregister(self.socket.id);
    }
}

/// Passed to join/leave/event callbacks so they can push, reply, broadcast,
/// or close the socket. `msg_ref` is `None` for join and leave, whose
/// replies are sent by the dispatcher itself.
pub struct EventContext<'a> {
    socket: &'a Socket,
    broker: &'a Broker,
    topic: &'a str,
    msg_ref: Option<String>,
}

impl<'a> EventContext<'a> {
    fn new(socket: &'a Socket, broker: &'a Broker, topic: &'a str, msg_ref: Option<String>) -> Self {
        Self {
            socket,
            broker,
            topic,
            msg_ref,
        }
    }

    pub fn push(&self, topic: &str, event: &str, payload: Value) {
        let envelope = Envelope::broadcast(topic, event, payload);
        let _ = self.socket.sender.send(&Frame::text(envelope.to_json()));
    }

    /// Sends a `phx_reply` answering the event currently being handled.
    pub fn reply(&self, status: &str, response: Value) {
        let envelope = Envelope::reply(self.topic, self.msg_ref.clone(), status, response);
        let _ = self.socket.sender.send(&Frame::text(envelope.to_json()));
    }

    pub fn broadcast(&self, topic: &str, event: &str, payload: Value) {
        let envelope = Envelope::broadcast(topic, event, payload);
        self.broker.publish(topic, &envelope, None);
    }

    /// Like [`Self::broadcast`] but excludes the socket handling the current
    /// event from delivery.
    pub fn broadcast_from(&self, topic: &str, event: &str, payload: Value) {
        let envelope = Envelope::broadcast(topic, event, payload);
        self.broker.publish(topic, &envelope, Some(self.socket.id));
    }

    /// Closes the underlying WebSocket connection with the given close code
    /// and reason, once this dispatch returns.
    pub fn close(&self, code: u16, reason: &str) {
        self.socket.close(code, reason);
    }
}

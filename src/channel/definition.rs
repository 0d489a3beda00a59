//! Channel definitions: topic pattern, join/leave callbacks, event table.
use super::dispatch::EventContext;
use super::topic::TopicPattern;
use serde_json::Value;

pub enum JoinResult {
    Ok,
    Error(Value),
}

pub type JoinFn = fn(&EventContext, &str, &Value) -> JoinResult;
pub type LeaveFn = fn(&EventContext, &str);
pub type EventFn = fn(&EventContext, &str, &Value);

pub struct ChannelDef {
    pub(super) pattern: TopicPattern,
    pub(super) join: JoinFn,
    pub(super) leave: Option<LeaveFn>,
    pub(super) handlers: Vec<(String, EventFn)>,
}

impl ChannelDef {
    pub fn handler_for(&self, event: &str) -> Option<EventFn> {
        self.handlers
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, f)| *f)
    }
}

/// Fluent builder returned by [`super::dispatch::ChannelRouter::channel`].
pub struct ChannelDefHandle<'r> {
    pub(super) defs: &'r mut Vec<ChannelDef>,
    pub(super) idx: usize,
}

impl<'r> ChannelDefHandle<'r> {
    pub fn on_leave(self, leave: LeaveFn) -> Self {
        self.defs[self.idx].leave = Some(leave);
        self
    }

    pub fn on_event(self, event: &str, handler: EventFn) -> Self {
        self.defs[self.idx].handlers.push((event.to_string(), handler));
        self
    }
}

pub(super) fn new_def(pattern: &str, join: JoinFn) -> ChannelDef {
    ChannelDef {
        pattern: TopicPattern::compile(pattern),
        join,
        leave: None,
        handlers: Vec::new(),
    }
}

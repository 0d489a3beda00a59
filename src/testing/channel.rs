//! In-process channel test harness: drives `join`/`leave`/`push` through
//! the real [`ChannelDispatcher`] against a mock socket and lets tests
//! inspect the frames it would have sent.
use crate::channel::{Broker, ChannelRouter, Envelope};
use crate::ws::{Frame, Message, WsSender};
use std::sync::{Arc, Mutex};

struct CapturingSender {
    frames: Mutex<Vec<Frame>>,
}

impl WsSender for CapturingSender {
    fn send(&self, frame: &Frame) -> std::io::Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

/// Drives [`crate::channel::ChannelDispatcher`] without a socket. Each call
/// delivers one channel-protocol envelope and returns the frames the
/// dispatcher pushed in response.
pub struct ChannelTestHarness {
    dispatcher: crate::channel::ChannelDispatcher,
    sender: Arc<CapturingSender>,
}

impl ChannelTestHarness {
    pub fn new(router: Arc<ChannelRouter>, socket_id: u64) -> Self {
        let sender = Arc::new(CapturingSender { frames: Mutex::new(Vec::new()) });
        let broker = Arc::new(Broker::new());
        let dispatcher = crate::channel::ChannelDispatcher::new(router, broker, socket_id, sender.clone());
        Self { dispatcher, sender }
    }

    fn deliver(&mut self, envelope: Envelope) -> Vec<Envelope> {
        use crate::ws::FrameHandler;
        let before = self.sender.frames.lock().unwrap().len();
        self.dispatcher.on_message(self.sender.as_ref(), Message::Text(envelope.to_json()));
        let frames = self.sender.frames.lock().unwrap();
        frames[before..]
            .iter()
            .filter_map(|f| std::str::from_utf8(&f.payload).ok())
            .filter_map(|s| Envelope::parse(s).ok())
            .collect()
    }

    pub fn join(&mut self, topic: &str, payload: serde_json::Value) -> Vec<Envelope> {
        self.deliver(Envelope {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload,
            msg_ref: Some("test-ref".to_string()),
        })
    }

    pub fn leave(&mut self, topic: &str) -> Vec<Envelope> {
        self.deliver(Envelope {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: serde_json::Value::Object(Default::default()),
            msg_ref: Some("test-ref".to_string()),
        })
    }

    pub fn push(&mut self, topic: &str, event: &str, payload: serde_json::Value) -> Vec<Envelope> {
        self.deliver(Envelope {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            msg_ref: Some("test-ref".to_string()),
        })
    }

    /// All frames captured so far, decoded as envelopes, newest last.
    pub fn all_frames(&self) -> Vec<Envelope> {
        self.sender
            .frames
            .lock()
            .unwrap()
            .iter()
            .filter_map(|f| std::str::from_utf8(&f.payload).ok())
            .filter_map(|s| Envelope::parse(s).ok())
            .collect()
    }
}

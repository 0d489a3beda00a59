//! Process-wide pub/sub fabric mapping topics to subscriber handles.
use super::envelope::Envelope;
use crate::ws::{Frame, WsSender};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Broker {
    subs: Mutex<HashMap<String, HashSet<u64>>>,
    senders: Mutex<HashMap<u64, Arc<dyn WsSender>>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: u64, sender: Arc<dyn WsSender>) {
        self.senders.lock().unwrap().insert(id, sender);
    }

    /// Removes a socket from every topic it was subscribed to, and drops its
    /// sender handle. Called when a connection closes.
    pub fn unregister(&self, id: u64) {
        self.senders.lock().unwrap().remove(&id);
        let mut subs = self.subs.lock().unwrap();
        for set in subs.values_mut() {
            set.remove(&id);
        }
        subs.retain(|_, set| !set.is_empty());
    }

    pub fn subscribe(&self, topic: &str, id: u64) {
        self.subs
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .insert(id);
    }

    pub fn unsubscribe(&self, topic: &str, id: u64) {
        if let Some(set) = self.subs.lock().unwrap().get_mut(topic) {
            set.remove(&id);
        }
    }

    /// Publishes to a snapshot of `topic`'s current subscriber set
    /// (subscribers added/removed mid-publish are not observed). A write
    /// failure on one subscriber is logged and does not interrupt delivery
    /// to the others.
    pub fn publish(&self, topic: &str, envelope: &Envelope, exclude: Option<u64>) {
        let snapshot: Vec<u64> = match self.subs.lock().unwrap().get(topic) {
            Some(set) => set.iter().copied().collect(),
            None => return,
        };

        let senders = self.senders.lock().unwrap();
        let frame = Frame::text(envelope.to_json());
        for id in snapshot {
            if Some(id) == exclude {
                continue;
            }
            let Some(sender) = senders.get(&id) else {
                continue;
            };
            if let Err(e) = sender.send(&frame) {
                tracing::warn!(subscriber = id, topic, error = %e, "broker publish failed, continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::LockedWriter;
    use std::sync::Mutex as StdMutex;

    struct CapturingSender {
        out: StdMutex<Vec<u8>>,
    }

    impl WsSender for CapturingSender {
        fn send(&self, frame: &crate::ws::Frame) -> std::io::Result<()> {
            frame.write_to(&mut *self.out.lock().unwrap())
        }
    }

    #[test]
    fn publish_reaches_all_subscribers_except_excluded() {
        let broker = Broker::new();
        let a = Arc::new(CapturingSender { out: StdMutex::new(Vec::new()) });
        let b = Arc::new(CapturingSender { out: StdMutex::new(Vec::new()) });
        broker.register(1, a.clone());
        broker.register(2, b.clone());
        broker.subscribe("room:lobby", 1);
        broker.subscribe("room:lobby", 2);

        let env = Envelope::broadcast("room:lobby", "new_msg", serde_json::json!({"body": "hi"}));
        broker.publish("room:lobby", &env, Some(1));

        assert!(a.out.lock().unwrap().is_empty());
        assert!(!b.out.lock().unwrap().is_empty());
    }

    #[test]
    fn unregister_removes_from_all_topics() {
        let broker = Broker::new();
        let sender = Arc::new(LockedWriter::new(Vec::<u8>::new()));
        broker.register(1, sender);
        broker.subscribe("room:a", 1);
        broker.subscribe("room:b", 1);
        broker.unregister(1);

        let env = Envelope::broadcast("room:a", "ping", serde_json::json!({}));
        // Should be a silent no-op: no subscribers left, no panic.
        broker.publish("room:a", &env, None);
    }

    #[test]
    fn publish_to_unknown_topic_is_noop() {
        let broker = Broker::new();
        let env = Envelope::broadcast("room:nobody", "ping", serde_json::json!({}));
        broker.publish("room:nobody", &env, None);
    }
}

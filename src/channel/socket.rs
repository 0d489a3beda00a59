//! Per-connection channel bookkeeping.
use crate::ws::WsSender;
use std::sync::Arc;

pub const MAX_JOINED_TOPICS: usize = 32;

/// Fixed-capacity set of joined topic names, mirroring the allocator-free
/// design of [`crate::http::Params`]/[`crate::http::Assigns`]. Mutated only
/// from the connection's own loop.
#[derive(Default)]
struct JoinedTopics {
    slots: [Option<String>; MAX_JOINED_TOPICS],
    len: usize,
}

impl JoinedTopics {
    fn contains(&self, topic: &str) -> bool {
        self.slots[..self.len].iter().any(|s| s.as_deref() == Some(topic))
    }

    fn insert(&mut self, topic: &str) -> bool {
        if self.contains(topic) {
            return true;
        }
        if self.len >= MAX_JOINED_TOPICS {
            return false;
        }
        self.slots[self.len] = Some(topic.to_string());
        self.len += 1;
        true
    }

    fn remove(&mut self, topic: &str) {
        if let Some(idx) = self.slots[..self.len].iter().position(|s| s.as_deref() == Some(topic)) {
            self.slots[idx] = self.slots[self.len - 1].take();
            self.len -= 1;
        }
    }
}

/// A connection participating in the channel protocol: an identity the
/// broker uses as its subscriber handle, the writer used to push frames,
/// and the set of topics currently joined.
pub struct Socket {
    pub id: u64,
    pub sender: Arc<dyn WsSender>,
    joined: JoinedTopics,
}

impl Socket {
    pub fn new(id: u64, sender: Arc<dyn WsSender>) -> Self {
        Self {
            id,
            sender,
            joined: JoinedTopics::default(),
        }
    }

    pub fn is_joined(&self, topic: &str) -> bool {
        self.joined.contains(topic)
    }

    pub fn join(&mut self, topic: &str) -> bool {
        self.joined.insert(topic)
    }

    pub fn leave(&mut self, topic: &str) {
        self.joined.remove(topic)
    }

    /// Handler-initiated close: writes a close frame and tells the frame
    /// loop to tear the connection down once the current dispatch returns.
    pub fn close(&self, code: u16, reason: &str) {
        self.sender.request_close(code, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::LockedWriter;

    fn socket() -> Socket {
        Socket::new(1, Arc::new(LockedWriter::new(Vec::<u8>::new())))
    }

    #[test]
    fn join_then_leave_round_trips() {
        let mut s = socket();
        assert!(!s.is_joined("room:lobby"));
        assert!(s.join("room:lobby"));
        assert!(s.is_joined("room:lobby"));
        s.leave("room:lobby");
        assert!(!s.is_joined("room:lobby"));
    }

    #[test]
    fn joining_same_topic_twice_is_idempotent() {
        let mut s = socket();
        assert!(s.join("room:lobby"));
        assert!(s.join("room:lobby"));
        assert_eq!(s.joined.len, 1);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut s = socket();
        for i in 0..MAX_JOINED_TOPICS {
            assert!(s.join(&format!("room:{i}")));
        }
        assert!(!s.join("room:overflow"));
    }
}

//! Type-erased, serialized frame sender. Lets the connection loop and a
//! broker broadcast both push frames to the same peer without either one
//! knowing the other exists, and keeps writes to one socket serialized so
//! concurrent senders never interleave frame bytes on the wire.
use super::frame::Frame;
use std::io::{self, Write};
use std::sync::Mutex;

/// Anything that can have frames pushed to it from any thread — the
/// connection's own loop, or the broker delivering a broadcast.
pub trait WsSender: Send + Sync {
    fn send(&self, frame: &Frame) -> io::Result<()>;

    /// A handler-initiated close: writes the close frame immediately. The
    /// frame loop notices via [`WsSender::close_requested`] and tears the
    /// connection down once the handler call that triggered this returns.
    fn request_close(&self, code: u16, reason: &str) {
        let _ = self.send(&Frame::close(code, reason));
    }

    /// Polled by the frame loop after each dispatched message to see whether
    /// the handler called [`WsSender::request_close`] during that dispatch.
    fn close_requested(&self) -> Option<(u16, String)> {
        None
    }
}

/// Wraps a real writer behind a mutex so concurrent senders (the connection
/// loop and the broker) never interleave frame bytes on the wire.
pub struct LockedWriter<W> {
    inner: Mutex<W>,
    close_state: Mutex<Option<(u16, String)>>,
}

impl<W: Write> LockedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
            close_state: Mutex::new(None),
        }
    }
}

impl<W: Write + Send> WsSender for LockedWriter<W> {
    fn send(&self, frame: &Frame) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        frame.write_to(&mut *guard)
    }

    fn request_close(&self, code: u16, reason: &str) {
        let _ = self.send(&Frame::close(code, reason));
        let mut state = self
            .close_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.is_none() {
            *state = Some((code, reason.to_string()));
        }
    }

    fn close_requested(&self) -> Option<(u16, String)> {
        self.close_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

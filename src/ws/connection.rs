//! WebSocket connection loop: Open/Closing/Closed state machine, fragment
//! reassembly, ping/pong, and close-code handling.
use super::deflate;
use super::frame::{Frame, FrameError, Opcode};
use super::sender::WsSender;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

/// Callbacks the connection loop drives. Implemented by the channel
/// dispatcher for channel-bearing sockets, or directly by a raw-callback
/// consumer.
pub trait FrameHandler {
    fn on_message(&mut self, sender: &dyn WsSender, message: Message);
    fn on_close(&mut self, code: u16, reason: &str);
}

pub struct ConnectionConfig {
    pub max_frame_bytes: u64,
    pub deflate_enabled: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: super::frame::MAX_FRAME_BYTES_HARD_CAP,
            deflate_enabled: false,
        }
    }
}

struct Fragment {
    opcode: Opcode,
    rsv1: bool,
    payload: Vec<u8>,
}

/// Runs the frame loop until the connection closes. `reader` drives inbound
/// frames; `sender` is the same writer handle handed to the socket/channel
/// layer so a future broadcast can reach the same peer.
pub fn run<R: Read>(
    reader: &mut R,
    sender: &dyn WsSender,
    handler: &mut dyn FrameHandler,
    config: &ConnectionConfig,
) {
    let mut fragment: Option<Fragment> = None;

    loop {
        let frame = match Frame::read_from(reader, config.max_frame_bytes) {
            Ok(f) => f,
            Err(FrameError::Eof) | Err(FrameError::Io) => {
                handler.on_close(1006, "");
                return;
            }
            Err(FrameError::UnknownOpcode)
            | Err(FrameError::ControlFrameTooLarge)
            | Err(FrameError::FragmentedControlFrame)
            | Err(FrameError::FrameTooLarge) => {
                let _ = sender.send(&Frame::close(1002, "protocol error"));
                handler.on_close(1002, "protocol error");
                return;
            }
        };

        match frame.opcode {
            Opcode::Ping => {
                let _ = sender.send(&Frame::pong(frame.payload));
            }
            Opcode::Pong => {
                // Heartbeat accounting only; not surfaced to the handler.
            }
            Opcode::Close => {
                let (code, reason) = frame.close_code_and_reason();
                let _ = sender.send(&Frame::close(code, &reason));
                handler.on_close(code, &reason);
                return;
            }
            Opcode::Continuation => {
                let Some(mut acc) = fragment.take() else {
                    let _ = sender.send(&Frame::close(1002, "unexpected continuation"));
                    handler.on_close(1002, "unexpected continuation");
                    return;
                };
                acc.payload.extend_from_slice(&frame.payload);
                if frame.fin {
                    if !deliver(acc.opcode, acc.rsv1, acc.payload, sender, handler, config) {
                        return;
                    }
                } else {
                    fragment = Some(acc);
                }
            }
            Opcode::Text | Opcode::Binary => {
                if frame.fin {
                    // A non-continuation data frame mid-stream resets the
                    // accumulator instead of closing with 1002 — a lenient
                    // policy, deliberately chosen over the strict reading.
                    fragment = None;
                    if !deliver(frame.opcode, frame.rsv1, frame.payload, sender, handler, config) {
                        return;
                    }
                } else {
                    fragment = Some(Fragment {
                        opcode: frame.opcode,
                        rsv1: frame.rsv1,
                        payload: frame.payload,
                    });
                }
            }
        }

        if let Some((code, reason)) = sender.close_requested() {
            handler.on_close(code, &reason);
            return;
        }
    }
}

/// Decompresses if needed, validates UTF-8 for text, and delivers to the
/// handler. Returns `false` if the connection was closed as a result (so the
/// caller's loop should stop).
fn deliver(
    opcode: Opcode,
    rsv1: bool,
    payload: Vec<u8>,
    sender: &dyn WsSender,
    handler: &mut dyn FrameHandler,
    config: &ConnectionConfig,
) -> bool {
    let payload = if rsv1 && config.deflate_enabled {
        match deflate::decompress(&payload) {
            Ok(p) => p,
            Err(_) => {
                let _ = sender.send(&Frame::close(1002, "bad deflate"));
                handler.on_close(1002, "bad deflate");
                return false;
            }
        }
    } else {
        payload
    };

    match opcode {
        Opcode::Text => match String::from_utf8(payload) {
            Ok(text) => dispatch_to_handler(sender, handler, Message::Text(text)),
            Err(_) => {
                let _ = sender.send(&Frame::close(1007, "invalid utf-8"));
                handler.on_close(1007, "invalid utf-8");
                false
            }
        },
        Opcode::Binary => dispatch_to_handler(sender, handler, Message::Binary(payload)),
        _ => unreachable!("deliver only called for Text/Binary"),
    }
}

/// Calls the handler with a caught unwind boundary: a panicking handler (or,
/// for channel sockets, a panicking join/leave/event callback underneath
/// `on_message`) closes the connection with 1011 instead of taking the
/// worker thread down with it.
fn dispatch_to_handler(sender: &dyn WsSender, handler: &mut dyn FrameHandler, message: Message) -> bool {
    let result = panic::catch_unwind(AssertUnwindSafe(|| handler.on_message(sender, message)));
    match result {
        Ok(()) => true,
        Err(payload) => {
            let detail = panic_message(&payload);
            tracing::error!(detail, "websocket handler panicked");
            let _ = sender.send(&Frame::close(1011, "internal error"));
            handler.on_close(1011, "internal error");
            false
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

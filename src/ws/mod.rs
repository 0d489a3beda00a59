//! WebSocket subsystem: frame codec, handshake, permessage-deflate, and the
//! connection loop.
pub mod connection;
pub mod deflate;
pub mod frame;
pub mod handshake;
pub mod sender;

pub use connection::{ConnectionConfig, FrameHandler, Message};
pub use frame::{Frame, FrameError, Opcode};
pub use handshake::{HandshakeError, compute_accept_key, switching_protocols_response, validate_and_accept_key};
pub use sender::{LockedWriter, WsSender};

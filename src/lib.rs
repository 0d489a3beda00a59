//! Zero-copy HTTP/1.1 and WebSocket request-handling core with a
//! Phoenix-style channel layer on top.
pub mod arena;
pub mod channel;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod http;
pub mod logging;
pub mod parser;
pub mod route;
pub mod router;
pub mod server;
pub mod syscalls;
pub mod testing;
pub mod transport;
pub mod worker;
pub mod ws;

pub use config::ServerConfig;
pub use context::{Context, HandlerFn, WsUpgrade};
pub use error::{ChopinError, ChopinResult};
pub use http::{Method, Request, Response};
pub use router::{Handled, Router};
pub use server::Server;

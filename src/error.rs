use std::io;
use thiserror::Error;

/// Central error type for the Chopin core engine.
///
/// Per-request HTTP parse failures and per-frame WebSocket protocol
/// failures are handled entirely at the connection loop, translated
/// directly into a response status or a close code without ever being
/// boxed up as a `ChopinError` — those layers run per-connection on a
/// thread that doesn't return a `Result` at all. This type covers the
/// failures that really do propagate through `?` at the server/worker
/// level: binding a listener, spawning a thread, parsing configuration.
#[derive(Debug, Error)]
pub enum ChopinError {
    /// Underlying I/O error from the OS or network.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic or miscellaneous error.
    #[error("{0}")]
    Other(String),
}

pub type ChopinResult<T> = Result<T, ChopinError>;

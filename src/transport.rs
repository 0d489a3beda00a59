//! Thin abstraction over a byte stream so the connection loop in
//! [`crate::connection`] doesn't need to know whether it's driving a real
//! socket or (in tests) an in-memory pipe.
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

pub trait Transport: Read + Write {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
    fn shutdown(&mut self) -> io::Result<()>;
    fn peer_label(&self) -> String;

    /// A second handle onto the same underlying stream, used as the write
    /// half once a connection upgrades to WebSocket: the frame loop reads
    /// from `self` while a [`crate::ws::LockedWriter`] around this handle
    /// is shared with the broker for cross-connection pushes. Only the
    /// connection's own worker ever reads; writes go through the shared
    /// per-socket lock so the broker and the frame loop never interleave.
    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, std::net::Shutdown::Both)
    }

    fn peer_label(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn try_clone_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }
}

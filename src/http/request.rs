use super::headers::Headers;
use super::method::{Method, Version};

/// A parsed HTTP/1.1 request.
///
/// `path`, `query`, and the header names/values are borrowed from the
/// connection's read buffer. The body is attached separately by the
/// transport once `Content-Length` bytes have been read, and may borrow
/// from the same buffer or point into the arena if it was read in a second
/// pass.
pub struct Request<'a> {
    pub method: Method,
    pub version: Version,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: Headers<'a>,
    pub body: Option<&'a [u8]>,
}

impl<'a> Request<'a> {
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name)
    }

    /// `Connection: close` or an HTTP/1.0 request without an explicit
    /// `Connection: keep-alive` both mean "close after this response".
    pub fn keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version.default_keep_alive(),
        }
    }

    pub fn body_bytes(&self) -> &'a [u8] {
        self.body.unwrap_or(&[])
    }
}

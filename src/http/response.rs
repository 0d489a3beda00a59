use super::headers::ResponseHeaders;
use super::status::reason_phrase;

/// The response a handler builds up.
///
/// `body_owned` tracks whether the body is safe to hand out past the
/// current request scope. The body is always an owned `Vec<u8>` today, so
/// the flag is a no-op check for now, but it keeps callers honest about not
/// assuming the body outlives the request if the allocation model changes.
pub struct Response {
    pub status: u16,
    pub headers: ResponseHeaders,
    pub body: Vec<u8>,
    pub body_owned: bool,
    /// Set by [`Response::suppress_body_for_head`] so the serializer still
    /// emits the `Content-Length` the body would have had.
    content_length_override: Option<usize>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: ResponseHeaders::new(),
            body: Vec::new(),
            body_owned: true,
            content_length_override: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200).with_body(body)
    }

    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200)
            .with_header("Content-Type", "application/json")
            .with_body(body)
    }

    pub fn json_value(value: &serde_json::Value) -> Self {
        Self::json(value.to_string().into_bytes())
    }

    pub fn not_found() -> Self {
        Self::new(404).with_body("Not Found")
    }

    pub fn method_not_allowed(allow: &str) -> Self {
        Self::new(405)
            .with_header("Allow", allow.to_string())
            .with_body("Method Not Allowed")
    }

    pub fn internal_error() -> Self {
        Self::new(500).with_body("Internal Server Error")
    }

    pub fn bad_request() -> Self {
        Self::new(400).with_body("Bad Request")
    }

    pub fn payload_too_large() -> Self {
        Self::new(413).with_body("Payload Too Large")
    }

    pub fn length_required() -> Self {
        Self::new(411).with_body("Length Required")
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self::new(status).with_header("Location", location)
    }

    /// Clears the body but keeps headers intact, for HEAD responses:
    /// `Content-Length` must still reflect what the body *would* have been.
    pub fn suppress_body_for_head(&mut self) {
        self.content_length_override = Some(self.body.len());
        self.body.clear();
        self.body_owned = false;
    }

    pub fn reason_phrase(&self) -> &'static str {
        reason_phrase(self.status)
    }

    /// Serializes the status line, headers, `Content-Length`, `Server`,
    /// and body. A `101 Switching Protocols` response is the one exception:
    /// it carries exactly the headers the handshake builder attached, with
    /// no `Content-Length` or `Date`.
    pub fn serialize(&self, server_ident: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.reason_phrase().as_bytes());
        out.extend_from_slice(b"\r\n");

        if self.status == 101 {
            for (name, value) in self.headers.iter() {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b": ");
                out.extend_from_slice(value.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"\r\n");
            return out;
        }

        let content_length = self.content_length_override.unwrap_or(self.body.len());
        out.extend_from_slice(format!("Content-Length: {}\r\n", content_length).as_bytes());
        out.extend_from_slice(format!("Server: {}\r\n", server_ident).as_bytes());
        out.extend_from_slice(format!("Date: {}\r\n", httpdate::fmt_http_date(std::time::SystemTime::now())).as_bytes());

        for (name, value) in self.headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

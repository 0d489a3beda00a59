//! Per-connection request loop: one worker owns one connection for its
//! entire lifetime, and only the read/write syscalls on that connection
//! ever block.
use crate::config::ServerConfig;
use crate::context::WsUpgrade;
use crate::http::{Method, Response};
use crate::parser::{self, ParseError, ParseLimits};
use crate::router::Router;
use crate::transport::Transport;
use crate::ws::{ConnectionConfig, FrameHandler, LockedWriter, WsSender};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

/// Drives one accepted connection to completion: parses requests, dispatches
/// them through `router`, writes the serialized response, and loops for
/// keep-alive until the peer closes, a timeout fires, or a request asks for
/// `Connection: close`. A handler that calls `upgrade_to_channels`/
/// `upgrade_to_raw` ends the HTTP loop and hands the same stream to the
/// WebSocket frame loop.
pub fn serve_connection<T: Transport>(mut stream: T, router: &Router, config: &ServerConfig) {
    let limits = ParseLimits {
        max_uri_bytes: config.max_uri_bytes,
        max_header_bytes: config.max_header_bytes,
        max_headers: config.max_headers,
    };

    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut requests_served: u64 = 0;

    loop {
        let timeout = if requests_served == 0 {
            config.read_timeout
        } else {
            config.keepalive_timeout
        };
        if let Err(e) = stream.set_read_timeout(Some(timeout)) {
            tracing::debug!(error = %e, "failed to set read timeout, closing connection");
            return;
        }

        match read_one_request(&mut stream, &mut buf, limits, config.max_body_bytes) {
            ReadOutcome::Request {
                head_len,
                body_len,
            } => {
                match dispatch_and_respond(&mut stream, router, config, &buf, head_len, body_len) {
                    DispatchOutcome::KeepAlive => {
                        requests_served += 1;
                        buf.drain(..head_len + body_len);
                    }
                    DispatchOutcome::Close => {
                        let _ = stream.shutdown();
                        return;
                    }
                    DispatchOutcome::Upgraded => return,
                }
            }
            ReadOutcome::Closed => return,
            ReadOutcome::Error(resp) => {
                let _ = stream.write_all(&resp.serialize(&config.server_ident));
                let _ = stream.shutdown();
                return;
            }
        }
    }
}

enum ReadOutcome {
    Request { head_len: usize, body_len: usize },
    Closed,
    Error(Response),
}

/// Reads (and accumulates in `buf`) until a full request — headers plus any
/// declared body — is available, or a limit/parse error/EOF ends the read.
fn read_one_request<T: Transport>(
    stream: &mut T,
    buf: &mut Vec<u8>,
    limits: ParseLimits,
    max_body_bytes: usize,
) -> ReadOutcome {
    let mut chunk = [0u8; 8192];

    loop {
        match parser::parse_request_with_limits(buf, limits) {
            Ok((request, head_len)) => {
                let content_length = match content_length_of(&request) {
                    Ok(v) => v,
                    Err(resp) => return ReadOutcome::Error(resp),
                };
                if content_length > max_body_bytes {
                    return ReadOutcome::Error(Response::payload_too_large());
                }
                while buf.len() < head_len + content_length {
                    let n = match stream.read(&mut chunk) {
                        Ok(0) => return ReadOutcome::Closed,
                        Ok(n) => n,
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                        Err(_) => return ReadOutcome::Closed,
                    };
                    buf.extend_from_slice(&chunk[..n]);
                }
                return ReadOutcome::Request {
                    head_len,
                    body_len: content_length,
                };
            }
            Err(ParseError::Incomplete) => {
                let n = match stream.read(&mut chunk) {
                    Ok(0) => return ReadOutcome::Closed,
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return ReadOutcome::Closed,
                    Err(_) => return ReadOutcome::Closed,
                };
                buf.extend_from_slice(&chunk[..n]);
            }
            Err(ParseError::UriTooLong) => return ReadOutcome::Error(Response::new(414).with_body("URI Too Long")),
            Err(ParseError::HeadersTooLarge) => {
                return ReadOutcome::Error(Response::new(431).with_body("Request Header Fields Too Large"));
            }
            Err(_) => return ReadOutcome::Error(Response::bad_request()),
        }
    }
}

/// Chunked transfer-encoding is not decoded: a request that declares it
/// is rejected outright rather than read incorrectly.
fn content_length_of(request: &crate::http::Request<'_>) -> Result<usize, Response> {
    if request.header("Transfer-Encoding").is_some() {
        return Err(Response::length_required());
    }
    match request.header("Content-Length") {
        Some(v) => v.trim().parse::<usize>().map_err(|_| Response::bad_request()),
        None => Ok(0),
    }
}

enum DispatchOutcome {
    KeepAlive,
    Close,
    /// The response has already been written and the stream handed off to
    /// the WebSocket frame loop; the HTTP loop must not touch it again.
    Upgraded,
}

/// Re-parses the now-complete request out of `buf` (cheap: it only borrows),
/// dispatches it through the router, and writes the serialized response.
/// If the handler requested a WebSocket upgrade, runs the frame loop on the
/// same stream before returning.
fn dispatch_and_respond<T: Transport>(
    stream: &mut T,
    router: &Router,
    config: &ServerConfig,
    buf: &[u8],
    head_len: usize,
    body_len: usize,
) -> DispatchOutcome {
    let limits = ParseLimits {
        max_uri_bytes: config.max_uri_bytes,
        max_header_bytes: config.max_header_bytes,
        max_headers: config.max_headers,
    };
    let (mut request, _) = match parser::parse_request_with_limits(&buf[..head_len + body_len], limits) {
        Ok(r) => r,
        Err(_) => {
            let _ = stream.write_all(&Response::bad_request().serialize(&config.server_ident));
            return DispatchOutcome::Close;
        }
    };
    if body_len > 0 {
        request.body = Some(&buf[head_len..head_len + body_len]);
    }

    let keep_alive = request.keep_alive();
    let deflate_requested = request
        .header("Sec-WebSocket-Extensions")
        .map(|v| v.contains("permessage-deflate"))
        .unwrap_or(false);
    let is_connect = matches!(request.method, Method::Connect);

    let mut handled = router.handle(&request);
    if handled.response.status == 101 {
        handled.response.headers.remove("Server");
        handled.response.headers.push("Server", config.server_ident.clone());
    }
    let _ = stream.write_all(&handled.response.serialize(&config.server_ident));

    match handled.ws_upgrade {
        None => {
            if keep_alive && !is_connect {
                DispatchOutcome::KeepAlive
            } else {
                DispatchOutcome::Close
            }
        }
        Some(upgrade) => {
            // A single `stream.read()` in `read_one_request` can pull in
            // bytes past this request's head+body — e.g. a client that
            // pipelines its first WebSocket frame right behind the
            // handshake request. Those bytes are still sitting in `buf`
            // and must reach the frame parser before any further real
            // socket reads, or they're silently lost.
            let leftover = buf[head_len + body_len..].to_vec();
            run_websocket(stream, router, config, upgrade, deflate_requested, leftover);
            DispatchOutcome::Upgraded
        }
    }
}

/// Builds the frame handler the upgrade requested and drains frames from
/// `stream` until the connection closes. `leftover` is whatever bytes were
/// already read past the handshake request and must be consumed before
/// any fresh socket reads.
fn run_websocket<T: Transport>(
    stream: &mut T,
    router: &Router,
    config: &ServerConfig,
    upgrade: WsUpgrade,
    deflate_requested: bool,
    leftover: Vec<u8>,
) {
    let Ok(writer_half) = stream.try_clone_writer() else {
        return;
    };
    let sender: Arc<dyn WsSender> = Arc::new(LockedWriter::new(writer_half));
    let conn_config = ConnectionConfig {
        max_frame_bytes: config.max_frame_bytes,
        deflate_enabled: deflate_requested,
    };
    let mut reader = PrefixedReader::new(leftover, stream);

    match upgrade {
        WsUpgrade::Channels => {
            let Some(channels) = router.channels().cloned() else {
                tracing::warn!("upgrade_to_channels called but no channel table is mounted");
                return;
            };
            let socket_id = router.next_socket_id();
            let mut dispatcher = crate::channel::ChannelDispatcher::new(channels, router.broker().clone(), socket_id, sender.clone());
            crate::ws::connection::run(&mut reader, sender.as_ref(), &mut dispatcher, &conn_config);
        }
        WsUpgrade::Raw(factory) => {
            let mut handler: Box<dyn FrameHandler> = factory(sender.clone());
            crate::ws::connection::run(&mut reader, sender.as_ref(), &mut *handler, &conn_config);
        }
    }
}

/// A [`Read`] adapter that first drains an in-memory prefix before falling
/// through to the wrapped transport's real reads.
struct PrefixedReader<'a, T> {
    prefix: Vec<u8>,
    pos: usize,
    inner: &'a mut T,
}

impl<'a, T> PrefixedReader<'a, T> {
    fn new(prefix: Vec<u8>, inner: &'a mut T) -> Self {
        Self { prefix, pos: 0, inner }
    }
}

impl<'a, T: Read> Read for PrefixedReader<'a, T> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if self.pos < self.prefix.len() {
            let remaining = &self.prefix[self.pos..];
            let n = remaining.len().min(out.len());
            out[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::Response;
    use crate::router::Router;
    use std::io::Cursor;

    /// An in-memory socket double: reads come from a fixed input buffer,
    /// writes accumulate in an output buffer, and `try_clone_writer` hands
    /// back a second handle onto the same output buffer.
    struct MockTransport {
        input: Cursor<Vec<u8>>,
        output: Arc<std::sync::Mutex<Vec<u8>>>,
    }

    impl MockTransport {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Arc::new(std::sync::Mutex::new(Vec::new())),
            }
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(out)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.output.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct MockWriterHandle(Arc<std::sync::Mutex<Vec<u8>>>);
    impl Write for MockWriterHandle {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockTransport {
        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> std::io::Result<()> {
            Ok(())
        }
        fn shutdown(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn peer_label(&self) -> String {
            "mock".to_string()
        }
        fn try_clone_writer(&self) -> std::io::Result<Box<dyn Write + Send>> {
            Ok(Box::new(MockWriterHandle(self.output.clone())))
        }
    }

    fn upgrade_handler(ctx: &mut Context) {
        let _ = ctx.upgrade_to_channels();
    }

    fn ws_upgrade_request_bytes(extra: &[u8]) -> Vec<u8> {
        let mut out = b"GET /ws HTTP/1.1\r\n\
Host: localhost\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\
\r\n"
            .to_vec();
        out.extend_from_slice(extra);
        out
    }

    /// A masked client close frame (opcode 0x8, empty payload, mask 00000000).
    fn client_close_frame_bytes() -> Vec<u8> {
        vec![0x88, 0x80, 0x00, 0x00, 0x00, 0x00]
    }

    #[test]
    fn chunked_transfer_encoding_request_is_rejected_with_411() {
        let router = Router::new();
        let config = ServerConfig::default();
        let request_bytes = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        let stream = MockTransport::new(request_bytes);
        let output = stream.output.clone();

        serve_connection(stream, &router, &config);

        let written = output.lock().unwrap();
        assert!(written.starts_with(b"HTTP/1.1 411"));
    }

    #[test]
    fn upgrade_handoff_writes_101_with_correct_accept_key() {
        let mut router = Router::new();
        router.mount_channels(crate::channel::ChannelRouter::new());
        router.get("/ws", upgrade_handler);
        let config = ServerConfig::default();

        let request_bytes = ws_upgrade_request_bytes(&client_close_frame_bytes());
        let stream = MockTransport::new(request_bytes);
        let output = stream.output.clone();

        serve_connection(stream, &router, &config);

        let written = output.lock().unwrap();
        let text = String::from_utf8_lossy(&written);
        assert!(text.starts_with("HTTP/1.1 101"));
        assert!(text.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    }

    #[test]
    fn close_frame_pipelined_with_the_handshake_request_is_not_lost() {
        // The close frame arrives in the same `read()` call as the handshake
        // request (no wait for the 101 in between). Before `PrefixedReader`
        // existed, those trailing bytes sat in `buf` and were discarded when
        // the raw stream was handed to the frame loop; the loop would then
        // see immediate EOF on the now-empty mock input and close with code
        // 1006 ("abnormal closure") instead of properly processing the
        // client's close frame and echoing one back.
        let mut router = Router::new();
        router.mount_channels(crate::channel::ChannelRouter::new());
        router.get("/ws", upgrade_handler);
        let config = ServerConfig::default();

        let request_bytes = ws_upgrade_request_bytes(&client_close_frame_bytes());
        let stream = MockTransport::new(request_bytes);
        let output = stream.output.clone();

        serve_connection(stream, &router, &config);

        let written = output.lock().unwrap();
        // Split off the HTTP response; whatever follows is written by the
        // WebSocket frame loop, through the same underlying output buffer
        // (`try_clone_writer` hands back a second handle onto it).
        let split = written.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4).unwrap();
        let ws_bytes = &written[split..];
        assert!(!ws_bytes.is_empty(), "frame loop must have echoed a close frame, not just seen EOF");
        assert_eq!(ws_bytes[0] & 0x0F, 0x8, "echoed frame must be a close frame (opcode 0x8)");
    }
}

//! Zero-copy HTTP/1.1 request-line/header parser.
use crate::http::{Headers, Method, Request, Version, params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No `\r\n\r\n` terminator yet — caller should read more bytes.
    Incomplete,
    InvalidRequestLine,
    InvalidMethod,
    InvalidVersion,
    InvalidHeader,
    /// URI exceeded the configured limit (default: 4096 bytes).
    UriTooLong,
    /// Header section exceeded the configured byte or count limit.
    HeadersTooLarge,
    /// Reserved for allocation failure; this pure-safe-Rust parser never
    /// triggers it, since every intermediate value borrows the input buffer.
    OutOfMemory,
}

/// Parsing limits, mirroring [`crate::config::ServerConfig`]'s HTTP fields.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    pub max_uri_bytes: usize,
    pub max_header_bytes: usize,
    pub max_headers: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_uri_bytes: 4096,
            max_header_bytes: 8192,
            max_headers: 100,
        }
    }
}

/// Parses an HTTP request out of `buf` using the default [`ParseLimits`].
/// Returns the parsed request and `bytes_consumed`, the offset just past
/// the blank line separating headers from body.
pub fn parse_request(buf: &[u8]) -> Result<(Request<'_>, usize), ParseError> {
    parse_request_with_limits(buf, ParseLimits::default())
}

pub fn parse_request_with_limits(
    buf: &[u8],
    limits: ParseLimits,
) -> Result<(Request<'_>, usize), ParseError> {
    let header_end = match find_double_crlf(buf) {
        Some(end) => end,
        None => return Err(ParseError::Incomplete),
    };

    let head = &buf[..header_end];
    if head.len() > limits.max_header_bytes {
        return Err(ParseError::HeadersTooLarge);
    }

    let mut lines = split_lines(head);
    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let (method, path, query, version) = parse_request_line(request_line, limits.max_uri_bytes)?;

    let mut headers = Headers::new();
    let mut count = 0usize;
    for line in lines {
        if line.is_empty() {
            continue;
        }
        count += 1;
        if count > limits.max_headers {
            return Err(ParseError::HeadersTooLarge);
        }
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(ParseError::InvalidHeader)?;
        let name = std::str::from_utf8(&line[..colon]).map_err(|_| ParseError::InvalidHeader)?;
        if name.is_empty() {
            return Err(ParseError::InvalidHeader);
        }
        let raw_value = &line[colon + 1..];
        let value = trim_ows(raw_value);
        let value = std::str::from_utf8(value).map_err(|_| ParseError::InvalidHeader)?;
        headers.push(name, value);
    }

    Ok((
        Request {
            method,
            version,
            path,
            query,
            headers,
            body: None,
        },
        header_end,
    ))
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// Splits a header block into CRLF-delimited lines, dropping the trailing
/// empty line produced by the final `\r\n\r\n`.
fn split_lines(head: &[u8]) -> impl Iterator<Item = &[u8]> {
    head.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
}

fn trim_ows(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != b' ' && b != b'\t');
    let Some(start) = start else { return &[] };
    let end = bytes.iter().rposition(|&b| b != b' ' && b != b'\t').unwrap();
    &bytes[start..=end]
}

fn parse_request_line(
    line: &[u8],
    max_uri_bytes: usize,
) -> Result<(Method, &str, Option<&str>, Version), ParseError> {
    let mut parts = line.splitn(3, |&b| b == b' ');
    let method_bytes = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let uri_bytes = parts.next().ok_or(ParseError::InvalidRequestLine)?;
    let version_bytes = parts.next().ok_or(ParseError::InvalidRequestLine)?;

    let method = Method::from_bytes(method_bytes).ok_or(ParseError::InvalidMethod)?;
    let version = Version::from_bytes(version_bytes).ok_or(ParseError::InvalidVersion)?;

    if uri_bytes.len() > max_uri_bytes {
        return Err(ParseError::UriTooLong);
    }
    let uri = std::str::from_utf8(uri_bytes).map_err(|_| ParseError::InvalidRequestLine)?;
    let (path, query) = match uri.find('?') {
        Some(idx) => (&uri[..idx], Some(&uri[idx + 1..])),
        None => (uri, None),
    };

    Ok((method, path, query, version))
}

/// Parses a query string into [`params::Params`]; exposed so the router and
/// context-building code share one implementation.
pub fn parse_query_params(query: Option<&str>) -> params::Params<'_> {
    params::parse_query(query.unwrap_or(""))
}

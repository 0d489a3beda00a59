//! HTTP→WebSocket upgrade handshake (RFC 6455 §4.2.2).
use crate::http::{Request, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    NotAnUpgradeRequest,
    MissingKey,
    UnsupportedVersion,
}

/// Validates the upgrade request and returns the computed
/// `Sec-WebSocket-Accept` value, or the reason it was rejected.
pub fn validate_and_accept_key(request: &Request<'_>) -> Result<String, HandshakeError> {
    let upgrade_ok = request
        .header("Upgrade")
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    let connection_ok = request
        .header("Connection")
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);
    if !upgrade_ok || !connection_ok {
        return Err(HandshakeError::NotAnUpgradeRequest);
    }

    let key = request
        .header("Sec-WebSocket-Key")
        .filter(|k| !k.is_empty())
        .ok_or(HandshakeError::MissingKey)?;

    let version_ok = request
        .header("Sec-WebSocket-Version")
        .map(|v| v.trim() == "13")
        .unwrap_or(false);
    if !version_ok {
        return Err(HandshakeError::UnsupportedVersion);
    }

    Ok(compute_accept_key(key))
}

/// `base64(SHA1(key || GUID))`.
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Builds the `101 Switching Protocols` response for a validated handshake.
pub fn switching_protocols_response(accept_key: &str, server_ident: &str) -> Response {
    Response::new(101)
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Accept", accept_key.to_string())
        .with_header("Server", server_ident.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Headers, Method, Version};

    fn upgrade_request<'a>(key: Option<&'a str>, version: Option<&'a str>) -> Request<'a> {
        let mut headers = Headers::new();
        headers.push("Upgrade", "websocket");
        headers.push("Connection", "Upgrade");
        if let Some(k) = key {
            headers.push("Sec-WebSocket-Key", k);
        }
        if let Some(v) = version {
            headers.push("Sec-WebSocket-Version", v);
        }
        Request {
            method: Method::Get,
            version: Version::Http11,
            path: "/ws",
            query: None,
            headers,
            body: None,
        }
    }

    #[test]
    fn rfc6455_accept_key_vector() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn validates_well_formed_handshake() {
        let req = upgrade_request(Some("dGhlIHNhbXBsZSBub25jZQ=="), Some("13"));
        let key = validate_and_accept_key(&req).unwrap();
        assert_eq!(key, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn rejects_missing_key() {
        let req = upgrade_request(None, Some("13"));
        assert_eq!(
            validate_and_accept_key(&req),
            Err(HandshakeError::MissingKey)
        );
    }

    #[test]
    fn rejects_wrong_version() {
        let req = upgrade_request(Some("dGhlIHNhbXBsZSBub25jZQ=="), Some("8"));
        assert_eq!(
            validate_and_accept_key(&req),
            Err(HandshakeError::UnsupportedVersion)
        );
    }

    #[test]
    fn switching_protocols_response_has_exact_headers() {
        let resp = switching_protocols_response("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=", "chopin");
        assert_eq!(resp.status, 101);
        assert_eq!(resp.headers.get("Upgrade"), Some("websocket"));
        assert_eq!(resp.headers.get("Connection"), Some("Upgrade"));
        assert_eq!(
            resp.headers.get("Sec-WebSocket-Accept"),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
    }
}

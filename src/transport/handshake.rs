//! Client side of the WebSocket opening handshake (RFC 6455).

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};
use url::Url;

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on the size of the server's response headers.
pub const MAX_RESPONSE_SIZE: usize = 8192;

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsbench::transport::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generate a fresh Sec-WebSocket-Key (16 random bytes, Base64).
///
/// # Errors
///
/// Returns `Error::Connection` if the OS random source is unavailable.
pub fn generate_key() -> Result<String> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| Error::Connection(format!("no randomness for handshake key: {}", e)))?;
    Ok(BASE64.encode(bytes))
}

/// Build the HTTP upgrade request for `url`.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` if the URL has no host.
pub fn upgrade_request(url: &Url, origin: &str, key: &str) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(format!("missing host in {}", url)))?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    Ok(format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {}\r\n\
         Origin: {}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        path, host, key, origin
    ))
}

/// Position just past the blank line ending the response headers, if present.
#[must_use]
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// The parts of a `101 Switching Protocols` response the client checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Sec-WebSocket-Accept header value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Parse a WebSocket handshake response from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if:
    /// - The data is not valid UTF-8 or is empty.
    /// - The status code is not `101`.
    /// - The `Upgrade` header is missing or not `websocket`.
    /// - The `Connection` header is missing or does not contain `upgrade`.
    /// - The `Sec-WebSocket-Accept` header is missing.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text =
            std::str::from_utf8(data).map_err(|_| Error::Handshake("Invalid UTF-8".into()))?;
        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| Error::Handshake("Empty response".into()))?;
        let mut parts = status_line.split_whitespace();
        let status = parts.nth(1).unwrap_or_default();
        if status != "101" {
            return Err(Error::Handshake(format!(
                "Expected 101 status, got: {}",
                status_line
            )));
        }

        let mut headers: HashMap<String, String> = HashMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_lowercase(), value.trim().to_string());
            }
        }

        let upgrade = headers
            .get("upgrade")
            .ok_or_else(|| Error::Handshake("Missing Upgrade header in response".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::Handshake(format!(
                "Invalid Upgrade header: {}",
                upgrade
            )));
        }

        let connection = headers
            .get("connection")
            .ok_or_else(|| Error::Handshake("Missing Connection header in response".into()))?;
        if !connection.to_lowercase().contains("upgrade") {
            return Err(Error::Handshake(format!(
                "Invalid Connection header: {}",
                connection
            )));
        }

        let accept = headers
            .remove("sec-websocket-accept")
            .ok_or_else(|| Error::Handshake("Missing Sec-WebSocket-Accept header".into()))?;

        Ok(Self { accept })
    }

    /// Check the accept value against the key that was sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] on mismatch.
    pub fn verify(&self, key: &str) -> Result<()> {
        if self.accept == compute_accept_key(key) {
            Ok(())
        } else {
            Err(Error::Handshake("Invalid Sec-WebSocket-Accept".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    #[test]
    fn test_compute_accept_key_rfc_example() {
        assert_eq!(compute_accept_key(RFC_KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_generate_key_is_16_bytes() {
        let key = generate_key().unwrap();
        assert_eq!(BASE64.decode(&key).unwrap().len(), 16);
        assert_ne!(key, generate_key().unwrap());
    }

    #[test]
    fn test_upgrade_request() {
        let url = Url::parse("ws://localhost:9898/ws?room=1").unwrap();
        let req = upgrade_request(&url, "http://localhost:9898/", RFC_KEY).unwrap();
        assert!(req.starts_with("GET /ws?room=1 HTTP/1.1\r\n"));
        assert!(req.contains("Host: localhost:9898\r\n"));
        assert!(req.contains("Origin: http://localhost:9898/\r\n"));
        assert!(req.contains(&format!("Sec-WebSocket-Key: {}\r\n", RFC_KEY)));
        assert!(req.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_upgrade_request_default_port() {
        let url = Url::parse("ws://example.com/").unwrap();
        let req = upgrade_request(&url, "http://example.com/", RFC_KEY).unwrap();
        assert!(req.contains("Host: example.com\r\n"));
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"HTTP/1.1 101 OK\r\n\r\nxyz"), Some(19));
        assert_eq!(find_header_end(b"HTTP/1.1 101 OK\r\n"), None);
    }

    #[test]
    fn test_parse_valid_response() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\n\
                    Upgrade: websocket\r\n\
                    Connection: Upgrade\r\n\
                    Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";
        let response = HandshakeResponse::parse(raw).unwrap();
        assert_eq!(response.accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert!(response.verify(RFC_KEY).is_ok());
    }

    #[test]
    fn test_parse_rejects_non_101() {
        let raw = b"HTTP/1.1 403 Forbidden\r\n\r\n";
        assert!(matches!(
            HandshakeResponse::parse(raw),
            Err(Error::Handshake(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_upgrade() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\n\
                    Connection: Upgrade\r\n\
                    Sec-WebSocket-Accept: x\r\n\r\n";
        assert!(HandshakeResponse::parse(raw).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_accept() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\n\
                    Upgrade: websocket\r\n\
                    Connection: Upgrade\r\n\r\n";
        assert!(HandshakeResponse::parse(raw).is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_accept() {
        let response = HandshakeResponse {
            accept: "bogus".into(),
        };
        assert!(matches!(response.verify(RFC_KEY), Err(Error::Handshake(_))));
    }
}

//! Opening handshake (RFC 6455 section 4).
//!
//! The client sends an HTTP/1.1 upgrade request carrying a random
//! `Sec-WebSocket-Key`; the server must answer 101 with a
//! `Sec-WebSocket-Accept` derived from that key. Any deviation aborts the
//! connection before a single frame is sent.

use base64::Engine;
use rand::Rng;
use sha1::{Digest, Sha1};

use crate::error::{WsError, WsResult};

/// Fixed GUID every accept digest is salted with (RFC 6455 section 1.3).
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Generates a `Sec-WebSocket-Key`: 16 random bytes, base64-encoded.
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    let nonce: [u8; 16] = rng.random();
    base64::engine::general_purpose::STANDARD.encode(nonce)
}

/// Computes the `Sec-WebSocket-Accept` value expected for `key`.
pub fn accept_for_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Builds the upgrade request.
///
/// Caller headers are appended after the defaults; a caller header whose
/// name collides with a default is dropped.
pub fn build_request(
    path: &str,
    host: &str,
    port: u16,
    key: &str,
    extra_headers: &[(String, String)],
) -> String {
    let origin_path = if path == "/" { "" } else { path };
    let defaults = [
        ("Host".to_string(), format!("{host}:{port}")),
        ("Origin".to_string(), format!("http://{host}:{port}{origin_path}")),
        ("Upgrade".to_string(), "websocket".to_string()),
        ("Connection".to_string(), "Upgrade".to_string()),
        ("Sec-WebSocket-Key".to_string(), key.to_string()),
        ("Sec-WebSocket-Version".to_string(), "13".to_string()),
    ];

    let mut request = format!("GET {path} HTTP/1.1\r\n");
    for (name, value) in &defaults {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    for (name, value) in extra_headers {
        if defaults
            .iter()
            .any(|(default, _)| default.eq_ignore_ascii_case(name))
        {
            continue;
        }
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("\r\n");
    request
}

/// A parsed HTTP response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseHead {
    pub status: u16,
    pub reason: String,
    headers: Vec<(String, String)>,
}

impl HttpResponseHead {
    /// Parses the head of an HTTP response (everything before the blank
    /// line, already stripped of it).
    pub fn parse(text: &str) -> WsResult<Self> {
        let mut lines = text.split("\r\n");
        let status_line = lines
            .next()
            .ok_or_else(|| WsError::handshake("empty response"))?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/") {
            return Err(WsError::handshake(format!(
                "invalid status line: {status_line:?}"
            )));
        }
        let status: u16 = parts
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| {
                WsError::handshake(format!("invalid status line: {status_line:?}"))
            })?;
        let reason = parts.next().unwrap_or("").to_string();

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(WsError::handshake(format!("invalid header line: {line:?}")));
            };
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Checks the upgrade response: status 101 and a matching accept digest.
pub fn verify_response(response: &HttpResponseHead, key: &str) -> WsResult<()> {
    if response.status != 101 {
        return Err(WsError::handshake(format!(
            "unexpected status {} {}",
            response.status, response.reason
        )));
    }
    let accept = response
        .header("Sec-WebSocket-Accept")
        .ok_or_else(|| WsError::handshake("missing Sec-WebSocket-Accept header"))?;
    let expected = accept_for_key(key);
    if accept != expected {
        return Err(WsError::handshake(format!(
            "Sec-WebSocket-Accept mismatch: got {accept:?}, expected {expected:?}"
        )));
    }
    Ok(())
}

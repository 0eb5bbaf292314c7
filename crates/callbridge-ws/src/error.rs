//! Wire engine error types.

use thiserror::Error;

/// Result type for wire engine operations.
pub type WsResult<T> = Result<T, WsError>;

/// Errors that can occur on a WebSocket connection.
#[derive(Debug, Error)]
pub enum WsError {
    /// A frame violated the wire grammar (bad opcode, reserved bits,
    /// inconsistent mask, oversized declared length).
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// A frame arrived out of sequence while assembling a message.
    #[error("invalid frame sequence: {reason}")]
    InvalidSequence { reason: String },

    /// The opening handshake was not accepted by the remote endpoint.
    #[error("handshake failed: {reason}")]
    HandshakeFailed { reason: String },

    /// The forward proxy refused the tunnel.
    #[error("proxy connect failed: {reason}")]
    ProxyFailed { reason: String },

    /// The socket is broken; no further traffic is possible.
    #[error("connection broken: {reason}")]
    Broken { reason: String },

    /// A blocking receive ran out its timeout with the peer still alive.
    #[error("receive timed out")]
    Timeout,

    /// The remote endpoint closed the connection.
    #[error("close received from remote endpoint")]
    CloseReceived,

    /// The endpoint url could not be parsed or uses an unknown scheme.
    #[error("invalid endpoint url: {reason}")]
    InvalidUrl { reason: String },

    /// IO error on the underlying socket.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or negotiation error.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
}

impl WsError {
    /// Creates a malformed frame error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Creates an invalid sequence error.
    pub fn sequence(reason: impl Into<String>) -> Self {
        Self::InvalidSequence {
            reason: reason.into(),
        }
    }

    /// Creates a handshake failure error.
    pub fn handshake(reason: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            reason: reason.into(),
        }
    }

    /// Creates a proxy failure error.
    pub fn proxy(reason: impl Into<String>) -> Self {
        Self::ProxyFailed {
            reason: reason.into(),
        }
    }

    /// Creates a broken connection error.
    pub fn broken(reason: impl Into<String>) -> Self {
        Self::Broken {
            reason: reason.into(),
        }
    }

    /// Creates an invalid url error.
    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            reason: reason.into(),
        }
    }

    /// True for errors after which the connection must be torn down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Timeout)
    }
}

//! Listener error types.

use std::io;
use thiserror::Error;

/// Result type for listener operations.
pub type ListenerResult<T> = Result<T, ListenerError>;

/// Errors that can occur in the listener daemon.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// IO error (socket, file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Connection error from the wire engine.
    #[error("connection error: {0}")]
    Ws(#[from] callbridge_ws::WsError),

    /// CTI protocol error.
    #[error("protocol error: {0}")]
    Cti(#[from] callbridge_cti::CtiError),

    /// Inbox/outbox filesystem error.
    #[error("storage error: {0}")]
    Storage(#[from] callbridge_core::StorageError),

    /// Another process holds the listener lease.
    #[error("listener mandate lost: {reason}")]
    MandateLost { reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl ListenerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a mandate loss error.
    pub fn mandate_lost(reason: impl Into<String>) -> Self {
        Self::MandateLost {
            reason: reason.into(),
        }
    }

    /// True when the listen loop must stop rather than keep going.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MandateLost { .. } => true,
            Self::Cti(error) => error.is_fatal(),
            _ => false,
        }
    }
}

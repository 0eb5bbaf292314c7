//! Client error types.

use std::fmt;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// Inbox, outbox or lease storage error.
    Storage(String),
    /// Error surfaced by the listener.
    Listener(String),
    /// The daemon did not reach the expected state.
    Connection(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
            Self::Listener(msg) => write!(f, "listener error: {}", msg),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<callbridge_core::StorageError> for ClientError {
    fn from(err: callbridge_core::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<callbridge_listener::ListenerError> for ClientError {
    fn from(err: callbridge_listener::ListenerError) -> Self {
        Self::Listener(err.to_string())
    }
}

//! Protocol layer error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type CtiResult<T> = Result<T, CtiError>;

/// Errors raised while building, parsing or interpreting CTI messages.
#[derive(Debug, Error)]
pub enum CtiError {
    /// An envelope could not be parsed or failed validation.
    #[error("invalid envelope: {reason}")]
    Xml { reason: String },

    /// The server rejected the client's credentials.
    ///
    /// Fatal: retrying with the same identity cannot succeed.
    #[error("authentication rejected: {details}")]
    AuthenticationRejected { details: String },

    /// The server refused a request for an application-level reason.
    #[error("request rejected with code {code}: {details}")]
    ApplicationRejected { code: u8, details: String },
}

impl CtiError {
    /// Creates an envelope error.
    pub fn xml(reason: impl Into<String>) -> Self {
        Self::Xml {
            reason: reason.into(),
        }
    }

    /// True for rejections the session must not retry past.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationRejected { .. })
    }
}

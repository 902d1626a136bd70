//! Unified error type.

/// The error type returned by sheaf's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// setup failures (a route pattern the [`Router`](crate::Router) refuses, an
/// unparsable bind address) and infrastructure failures: binding to a port or
/// accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("pattern `{pattern}` conflicts with already registered `{existing}`")]
    Conflict { pattern: String, existing: String },

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),
}

impl Error {
    pub(crate) fn invalid(pattern: &str, reason: &'static str) -> Self {
        Self::InvalidPattern { pattern: pattern.to_owned(), reason }
    }
}

//! Error types for request dispatch

use std::sync::Arc;

use transport::{HttpError, RequestKey};

/// Errors surfaced to callers of `Client`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Suppressed before transmission: the same key is already in flight.
    /// Callers treat this as "request suppressed", not as a transport failure.
    #[error("duplicate request: {0} already in progress")]
    DuplicateRequest(RequestKey),

    /// Transport-level failure, including a 401 on a request that was
    /// already a retry.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The token refresh triggered by (or awaited by) this request failed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] Arc<Error>),

    /// The refresh this request was waiting on was dropped before settling.
    #[error("token refresh abandoned before completion")]
    RefreshAbandoned,
}

impl Error {
    /// HTTP status of the underlying transport failure, if any.
    pub fn status(&self) -> Option<transport::StatusCode> {
        match self {
            Error::Http(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicateRequest(_))
    }
}

/// Result alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

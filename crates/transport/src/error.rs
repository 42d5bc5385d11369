//! Error types for transport operations

use bytes::Bytes;
use reqwest::StatusCode;

use crate::request::HttpRequest;

/// Failure of a single transmitted request.
///
/// Both variants own the originating request so the caller can recompute its
/// key, release tracker state, and resubmit it.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The server answered with a non-2xx status.
    #[error("{} returned {status}", .request.key())]
    Status {
        status: StatusCode,
        body: Bytes,
        request: Box<HttpRequest>,
    },

    /// No response was obtained (connect error, timeout, body read failure).
    #[error("{} failed: {message}", .request.key())]
    Network {
        message: String,
        timeout: bool,
        request: Box<HttpRequest>,
    },
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Network { .. } => None,
        }
    }

    /// True for a 401 response.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn request(&self) -> &HttpRequest {
        match self {
            HttpError::Status { request, .. } | HttpError::Network { request, .. } => request,
        }
    }

    pub fn into_request(self) -> HttpRequest {
        match self {
            HttpError::Status { request, .. } | HttpError::Network { request, .. } => *request,
        }
    }
}

/// A `method:/path` string that does not describe a request key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid request key: {0}")]
pub struct InvalidKey(pub String);

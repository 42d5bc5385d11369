//! HTTP transport abstraction for the Recifit client
//!
//! Defines the `Transport` trait that decouples request dispatch (deduplication,
//! refresh coordination) from the actual HTTP stack. `ReqwestTransport` is the
//! production implementation; tests substitute scripted in-memory transports.
//!
//! A transport resolves every request to exactly one of:
//! - `Ok(HttpResponse)` for a 2xx status
//! - `Err(HttpError::Status { .. })` for any other status
//! - `Err(HttpError::Network { .. })` when no response was obtained
//!
//! Both error variants carry the originating `HttpRequest` so callers can
//! recompute its `RequestKey` and resubmit it.

pub mod error;
pub mod http;
pub mod request;

pub use error::{HttpError, InvalidKey};
pub use http::{HeaderInjection, ReqwestTransport};
pub use request::{HttpRequest, HttpResponse, Metadata, RequestKey};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by `Transport::send`.
pub type SendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Issues HTTP requests and suspends until a response or failure is available.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
/// Timeouts are the transport's concern; callers impose none of their own.
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest", "mock")
    fn id(&self) -> &str;

    /// Transmit the request.
    fn send(&self, request: HttpRequest) -> SendFuture<'_>;
}

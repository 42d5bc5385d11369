//! reqwest-backed transport
//!
//! Joins each request path onto a base URL, injects configured default headers,
//! applies a per-request timeout, and maps the outcome onto `HttpResponse` /
//! `HttpError`. Non-2xx statuses become `HttpError::Status` so that callers see
//! the same failure channel for 401s as for network errors.
//!
//! Credentials (session cookies) are whatever the supplied `reqwest::Client`
//! carries; build it with a shared `reqwest::cookie::Jar` to give several
//! transports one session.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::error::HttpError;
use crate::request::{HttpRequest, HttpResponse};
use crate::{SendFuture, Transport};

/// Default header applied to every request (name + value pair from config).
#[derive(Debug, Clone)]
pub struct HeaderInjection {
    pub name: String,
    pub value: String,
}

/// HTTP transport over a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    default_headers: HeaderMap,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_headers: HeaderMap::new(),
            timeout,
        }
    }

    /// Add default headers. Invalid names or values are skipped with a warning;
    /// headers set on an individual request take precedence.
    pub fn with_headers(mut self, injections: &[HeaderInjection]) -> Self {
        for injection in injections {
            let name = match HeaderName::from_str(&injection.name) {
                Ok(n) => n,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header name");
                    continue;
                }
            };
            let value = match HeaderValue::from_str(&injection.value) {
                Ok(v) => v,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header value");
                    continue;
                }
            };
            self.default_headers.insert(name, value);
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = self.url_for(request.path());

        let mut headers = self.default_headers.clone();
        for (name, value) in request.headers() {
            headers.insert(name.clone(), value.clone());
        }

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(headers)
            .timeout(self.timeout);
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %url, error = %e, "request failed before response");
                return Err(HttpError::Network {
                    message: e.to_string(),
                    timeout: e.is_timeout(),
                    request: Box::new(request),
                });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                return Err(HttpError::Network {
                    message: format!("response body read error: {e}"),
                    timeout: e.is_timeout(),
                    request: Box::new(request),
                });
            }
        };

        debug!(url = %url, status = status.as_u16(), "response received");

        if !status.is_success() {
            return Err(HttpError::Status {
                status,
                body,
                request: Box::new(request),
            });
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
            request,
        })
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn send(&self, request: HttpRequest) -> SendFuture<'_> {
        Box::pin(self.execute(request))
    }
}

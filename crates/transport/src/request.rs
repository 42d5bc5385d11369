//! Request, response, and request identity types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::InvalidKey;

/// Deduplication identity of a request: method + path.
///
/// Query strings are part of the identity only when they are part of the path.
/// Rendered as `<lowercase method>:<path>`, e.g. `get:/recipes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    path: String,
}

impl RequestKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.method.as_str().to_ascii_lowercase(),
            self.path
        )
    }
}

impl FromStr for RequestKey {
    type Err = InvalidKey;

    /// Parse the `method:/path` form used in exemption lists.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (method, path) = s
            .split_once(':')
            .ok_or_else(|| InvalidKey(format!("expected method:/path, got: {s}")))?;
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| InvalidKey(format!("invalid method in key: {s}")))?;
        let path = path.trim();
        if !path.starts_with('/') {
            return Err(InvalidKey(format!("path must start with '/', got: {s}")));
        }
        Ok(Self::new(method, path))
    }
}

/// Per-request metadata. Immutable once the request is built; resubmissions
/// get a fresh copy through `HttpRequest::into_retry`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    retry: bool,
    tags: BTreeMap<String, String>,
}

impl Metadata {
    /// Whether this request is a resubmission that bypasses deduplication.
    pub fn is_retry(&self) -> bool {
        self.retry
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// An outgoing HTTP request, addressed relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    metadata: Metadata,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            metadata: Metadata::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> serde_json::Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.tags.insert(name.into(), value.into());
        self
    }

    /// Consume the request and return it marked as a retry.
    pub fn into_retry(mut self) -> Self {
        self.metadata.retry = true;
        self
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.clone(), self.path.clone())
    }

    pub fn is_retry(&self) -> bool {
        self.metadata.retry
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// A successful (2xx) response together with the request that produced it.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request: HttpRequest,
}

impl HttpResponse {
    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

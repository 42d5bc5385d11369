//! Scripted in-memory transport for dispatch tests

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Semaphore;
use transport::{
    HeaderMap, HttpError, HttpRequest, HttpResponse, RequestKey, SendFuture, StatusCode, Transport,
};

/// How the mock answers one request.
pub(crate) enum Reply {
    /// Answer immediately with this status.
    Status(u16),
    /// Wait for a gate permit, then answer with this status.
    Held(u16),
    /// Fail without a response.
    Network,
}

pub(crate) struct MockTransport {
    sent: Mutex<Vec<HttpRequest>>,
    gate: Semaphore,
    script: Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>,
}

impl MockTransport {
    pub(crate) fn new(script: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
            script: Box::new(script),
        })
    }

    /// Let `n` held requests answer.
    pub(crate) fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Every request that reached the transport, in arrival order.
    pub(crate) fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, key: &str) -> usize {
        let key: RequestKey = key.parse().unwrap();
        self.sent().iter().filter(|r| r.key() == key).count()
    }
}

impl Transport for MockTransport {
    fn id(&self) -> &str {
        "mock"
    }

    fn send(&self, request: HttpRequest) -> SendFuture<'_> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(request.clone());
            let status = match (self.script)(&request) {
                Reply::Status(status) => status,
                Reply::Held(status) => {
                    self.gate.acquire().await.unwrap().forget();
                    status
                }
                Reply::Network => {
                    return Err(HttpError::Network {
                        message: "connection reset".into(),
                        timeout: false,
                        request: Box::new(request),
                    });
                }
            };
            let status = StatusCode::from_u16(status).unwrap();
            if status.is_success() {
                Ok(HttpResponse {
                    status,
                    headers: HeaderMap::new(),
                    body: Bytes::from(format!(r#"{{"path":"{}"}}"#, request.path())),
                    request,
                })
            } else {
                Err(HttpError::Status {
                    status,
                    body: Bytes::new(),
                    request: Box::new(request),
                })
            }
        })
    }
}

pub(crate) fn ok_response(request: HttpRequest) -> HttpResponse {
    HttpResponse {
        status: StatusCode::OK,
        headers: HeaderMap::new(),
        body: Bytes::new(),
        request,
    }
}

pub(crate) fn unauthorized(request: HttpRequest) -> HttpError {
    HttpError::Status {
        status: StatusCode::UNAUTHORIZED,
        body: Bytes::from_static(b"token expired"),
        request: Box::new(request),
    }
}

/// Yield to other tasks until `condition` holds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached after 1000 yields");
}

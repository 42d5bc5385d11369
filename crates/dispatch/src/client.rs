//! General-purpose and authenticated clients
//!
//! Every request goes through the same dispatch path:
//! 1. `RequestTracker::admit` rejects duplicates and registers the key
//! 2. the transport sends the request
//! 3. the pending guard releases the key before the result is returned
//!
//! The authenticated client additionally hands 401 failures of non-retry
//! requests to its `RefreshCoordinator`, which refreshes the session once and
//! resubmits through step 1-3 with the retry marker set. Resubmissions that
//! fail again are returned unchanged.
//!
//! The key of the original request stays pending until its recovery settles,
//! so a second copy issued while the session refresh runs is still rejected.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use transport::{HttpError, HttpRequest, HttpResponse, Method, RequestKey, Transport};

use crate::constants::{DEFAULT_EXEMPT_KEYS, REFRESH_PATH};
use crate::coordinator::{RefreshCoordinator, WaiterPolicy};
use crate::error::{Error, Result};
use crate::refresh::SessionRefresher;
use crate::telemetry;
use crate::tracker::{PendingGuard, RequestTracker};

struct Inner {
    name: &'static str,
    transport: Arc<dyn Transport>,
    tracker: Arc<RequestTracker>,
    coordinator: Option<RefreshCoordinator>,
}

/// HTTP client with duplicate suppression and, when authenticated, refresh
/// coordination. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Client without refresh coordination.
    pub fn general(transport: Arc<dyn Transport>, tracker: Arc<RequestTracker>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: "general",
                transport,
                tracker,
                coordinator: None,
            }),
        }
    }

    /// Client whose 401 failures are recovered through `coordinator`.
    pub fn authenticated(
        transport: Arc<dyn Transport>,
        tracker: Arc<RequestTracker>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: "api",
                transport,
                tracker,
                coordinator: Some(coordinator),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.inner.tracker
    }

    pub fn coordinator(&self) -> Option<&RefreshCoordinator> {
        self.inner.coordinator.as_ref()
    }

    /// Send a request, recovering from an expired session when authenticated.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = request.key();
        let _pending = self.admit(&key, request.is_retry())?;
        let result = self.transmit(request).await;
        let Some(coordinator) = &self.inner.coordinator else {
            return result;
        };
        match result {
            Err(Error::Http(err)) if err.is_unauthorized() && !err.request().is_retry() => {
                coordinator
                    .recover(err.into_request(), |retry| self.dispatch(retry))
                    .await
            }
            other => other,
        }
    }

    pub async fn get(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.send(HttpRequest::get(path)).await
    }

    pub async fn post(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.send(HttpRequest::post(path)).await
    }

    pub async fn put(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.send(HttpRequest::put(path)).await
    }

    pub async fn patch(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.send(HttpRequest::patch(path)).await
    }

    pub async fn delete(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.send(HttpRequest::delete(path)).await
    }

    /// One pass through tracker and transport; no refresh handling.
    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = request.key();
        let _pending = self.admit(&key, request.is_retry())?;
        self.transmit(request).await
    }

    fn admit(&self, key: &RequestKey, is_retry: bool) -> Result<PendingGuard<'_>> {
        self.inner.tracker.admit(key, is_retry).inspect_err(|_| {
            warn!(
                client = self.name(),
                key = %key,
                "request already in progress, suppressed"
            );
            telemetry::record_duplicate(self.name(), key.method());
        })
    }

    #[instrument(skip_all, fields(
        client = self.name(),
        request_id = %new_request_id(),
        key = %request.key(),
        retry = request.is_retry(),
    ))]
    async fn transmit(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method().clone();
        let started = Instant::now();
        let result = self.inner.transport.send(request).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_unauthorized() => "unauthorized",
            Err(HttpError::Status { .. }) => "status",
            Err(HttpError::Network { .. }) => "network",
        };
        debug!(outcome, transport = self.inner.transport.id(), "request completed");
        telemetry::record_request(
            self.name(),
            &method,
            outcome,
            started.elapsed().as_secs_f64(),
        );

        result.map_err(Error::from)
    }
}

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().as_simple())
}

/// Construction options for `ClientSet`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Keys that may run concurrently with themselves.
    pub exempt: Vec<RequestKey>,
    /// Refresh endpoint path on the general-purpose client.
    pub refresh_path: String,
    pub waiter_policy: WaiterPolicy,
}

impl ClientOptions {
    /// Key of the refresh call; always exempt from deduplication.
    pub fn refresh_key(&self) -> RequestKey {
        RequestKey::new(Method::POST, self.refresh_path.clone())
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            exempt: DEFAULT_EXEMPT_KEYS
                .iter()
                .filter_map(|k| k.parse().ok())
                .collect(),
            refresh_path: REFRESH_PATH.to_string(),
            waiter_policy: WaiterPolicy::default(),
        }
    }
}

/// The general-purpose and authenticated clients of one page context.
///
/// Both share one `RequestTracker`. The authenticated client's coordinator
/// refreshes through the general-purpose client.
#[derive(Clone)]
pub struct ClientSet {
    pub general: Client,
    pub api: Client,
}

impl ClientSet {
    pub fn new(
        general_transport: Arc<dyn Transport>,
        api_transport: Arc<dyn Transport>,
        options: ClientOptions,
    ) -> Self {
        let refresh_key = options.refresh_key();
        let mut exempt = options.exempt;
        exempt.push(refresh_key);
        let tracker = Arc::new(RequestTracker::new(exempt));

        let general = Client::general(general_transport, tracker.clone());
        let refresher = SessionRefresher::new(general.clone(), options.refresh_path);
        let refresh_path = refresher.path().to_string();
        let coordinator = RefreshCoordinator::new(Arc::new(refresher), options.waiter_policy);
        info!(
            refresh_path = %refresh_path,
            waiter_policy = ?coordinator.policy(),
            "clients initialized"
        );
        let api = Client::authenticated(api_transport, tracker, coordinator);
        Self { general, api }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, Reply, wait_until};
    use transport::StatusCode;

    fn clients(general: &Arc<MockTransport>, api: &Arc<MockTransport>) -> ClientSet {
        ClientSet::new(general.clone(), api.clone(), ClientOptions::default())
    }

    fn never_called() -> Arc<MockTransport> {
        MockTransport::new(|req| panic!("unexpected request: {}", req.key()))
    }

    #[tokio::test]
    async fn exempt_key_reaches_transport_concurrently() {
        let general = never_called();
        let api = MockTransport::new(|_| Reply::Held(200));
        let set = clients(&general, &api);

        let first = tokio::spawn({
            let api = set.api.clone();
            async move { api.get("/recipes").await }
        });
        let second = tokio::spawn({
            let api = set.api.clone();
            async move { api.get("/recipes").await }
        });
        wait_until(|| api.sent().len() == 2).await;

        api.open(2);
        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
        assert_eq!(api.count("get:/recipes"), 2);
    }

    #[tokio::test]
    async fn duplicate_in_flight_request_is_rejected_before_transport() {
        let general = never_called();
        let api = MockTransport::new(|_| Reply::Held(200));
        let set = clients(&general, &api);
        let orders = HttpRequest::get("/orders").key();

        let first = tokio::spawn({
            let api = set.api.clone();
            async move { api.get("/orders").await }
        });
        wait_until(|| api.sent().len() == 1).await;

        let err = set.api.get("/orders").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateRequest(ref k) if *k == orders));
        assert_eq!(api.count("get:/orders"), 1, "duplicate must not reach the transport");

        api.open(1);
        first.await.unwrap().unwrap();
        assert!(!set.api.tracker().is_pending(&orders));

        // Once the first call settled the key is free again
        api.open(1);
        set.api.get("/orders").await.unwrap();
        assert_eq!(api.count("get:/orders"), 2);
    }

    #[tokio::test]
    async fn key_stays_pending_while_session_refresh_runs() {
        let general = MockTransport::new(|_| Reply::Held(200));
        let api = MockTransport::new(|req| {
            if req.is_retry() {
                Reply::Status(201)
            } else {
                Reply::Status(401)
            }
        });
        let set = clients(&general, &api);
        let orders = HttpRequest::post("/orders").key();

        let first = tokio::spawn({
            let api = set.api.clone();
            async move { api.post("/orders").await }
        });
        wait_until(|| general.sent().len() == 1).await;
        assert!(set.api.tracker().is_pending(&orders));

        // Double submit while the refresh is held
        let err = set.api.post("/orders").await.unwrap_err();
        assert!(err.is_duplicate());

        general.open(1);
        let response = first.await.unwrap().unwrap();
        assert_eq!(response.status, StatusCode::CREATED);

        let sent = api.sent();
        assert_eq!(api.count("post:/orders"), 2);
        assert_eq!(sent.iter().filter(|r| r.is_retry()).count(), 1);
        assert!(!set.api.tracker().is_pending(&orders));
    }

    #[tokio::test]
    async fn clients_share_one_pending_set() {
        let general = MockTransport::new(|_| Reply::Held(200));
        let api = never_called();
        let set = clients(&general, &api);

        let first = tokio::spawn({
            let general = set.general.clone();
            async move { general.get("/orders").await }
        });
        wait_until(|| general.sent().len() == 1).await;

        assert!(set.api.get("/orders").await.unwrap_err().is_duplicate());
        general.open(1);
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_trigger_one_refresh() {
        let general = MockTransport::new(|_| Reply::Held(200));
        let api = MockTransport::new(|req| {
            if req.is_retry() {
                Reply::Status(200)
            } else {
                Reply::Held(401)
            }
        });
        let set = clients(&general, &api);

        let handles: Vec<_> = (1..=3)
            .map(|n| {
                let api = set.api.clone();
                tokio::spawn(async move { api.get(format!("/orders/{n}")).await })
            })
            .collect();
        wait_until(|| api.sent().len() == 3).await;

        // All three fail with 401 at once
        api.open(3);
        let coordinator = set.api.coordinator().unwrap();
        wait_until(|| general.sent().len() == 1 && coordinator.waiting() == 2).await;
        assert!(coordinator.is_refreshing());

        general.open(1);
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.status, StatusCode::OK);
            assert!(response.request.is_retry());
        }

        assert_eq!(general.count("post:/api/auth/token"), 1);
        let sent = api.sent();
        assert_eq!(sent.len(), 6);
        assert_eq!(sent.iter().filter(|r| r.is_retry()).count(), 3);
        assert!(!coordinator.is_refreshing());
        assert_eq!(set.api.tracker().pending_count(), 0);
    }

    #[tokio::test]
    async fn refresh_call_is_tagged_and_exempt() {
        let general = MockTransport::new(|_| Reply::Status(200));
        let api = MockTransport::new(|req| {
            if req.is_retry() {
                Reply::Status(204)
            } else {
                Reply::Status(401)
            }
        });
        let set = clients(&general, &api);

        let response = set.api.delete("/recipes/12/like").await.unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);

        let refresh = &general.sent()[0];
        assert_eq!(refresh.key().to_string(), "post:/api/auth/token");
        assert_eq!(refresh.metadata().tag("purpose"), Some("session-refresh"));
        assert!(set.general.tracker().is_exempt(&refresh.key()));
    }

    #[tokio::test]
    async fn retry_that_fails_again_does_not_refresh_twice() {
        let general = MockTransport::new(|_| Reply::Status(200));
        let api = MockTransport::new(|_| Reply::Status(401));
        let set = clients(&general, &api);

        let err = set.api.get("/orders").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(matches!(err, Error::Http(ref e) if e.request().is_retry()));

        assert_eq!(general.count("post:/api/auth/token"), 1);
        assert_eq!(api.sent().len(), 2);
        assert!(!set.api.coordinator().unwrap().is_refreshing());
    }

    #[tokio::test]
    async fn failed_refresh_is_returned_to_the_caller() {
        let general = MockTransport::new(|_| Reply::Status(401));
        let api = MockTransport::new(|_| Reply::Status(401));
        let set = clients(&general, &api);

        let err = set.api.get("/orders").await.unwrap_err();
        match err {
            Error::RefreshFailed(cause) => {
                assert_eq!(cause.status(), Some(StatusCode::UNAUTHORIZED));
            }
            other => panic!("expected refresh failure, got {other:?}"),
        }
        assert_eq!(api.sent().len(), 1, "no resubmission after a failed refresh");
        assert_eq!(set.api.tracker().pending_count(), 0);
    }

    #[tokio::test]
    async fn other_failures_pass_through_and_release_key() {
        let general = never_called();
        let api = MockTransport::new(|req| match req.path() {
            "/orders" => Reply::Network,
            _ => Reply::Status(403),
        });
        let set = clients(&general, &api);

        let err = set.api.get("/orders").await.unwrap_err();
        assert!(matches!(err, Error::Http(HttpError::Network { .. })));
        assert!(!set.api.tracker().is_pending(&HttpRequest::get("/orders").key()));

        let err = set.api.put("/profile").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(set.api.tracker().pending_count(), 0);
        assert!(!set.api.coordinator().unwrap().is_refreshing());
    }

    #[tokio::test]
    async fn general_client_passes_unauthorized_through() {
        let general = MockTransport::new(|_| Reply::Status(401));
        let api = never_called();
        let set = clients(&general, &api);

        let err = set.general.post("/auth/login").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(general.sent().len(), 1);
        assert!(set.general.coordinator().is_none());
    }

    #[test]
    fn default_options_exempt_listing_endpoints() {
        let options = ClientOptions::default();
        let exempt: Vec<String> = options.exempt.iter().map(ToString::to_string).collect();
        assert_eq!(exempt, ["get:/users", "get:/recipes"]);
        assert_eq!(options.refresh_key().to_string(), "post:/api/auth/token");
        assert_eq!(options.waiter_policy, WaiterPolicy::Resubmit);
    }
}

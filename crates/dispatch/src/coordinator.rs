//! Single-flight session refresh
//!
//! When an authenticated request fails with 401, the coordinator either becomes
//! the refresh leader (no refresh pending) or queues the request behind the
//! refresh already in flight. Once the refresh settles every queued waiter is
//! woken in enqueue order and resubmits its own request marked as retry.
//!
//! State transitions:
//! - Idle → Refreshing (401 on a non-retry request, no refresh pending)
//! - Refreshing → Idle (refresh settled: succeeded, failed, or abandoned)
//!
//! The leader holds a `RefreshLease`. Dropping the lease without settling it
//! (the leader's future was dropped) settles as `Abandoned`, so waiters are
//! never stranded behind a refresh nobody is driving.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use transport::{HttpRequest, HttpResponse};

use crate::error::{Error, Result};
use crate::refresh::Refresher;
use crate::telemetry;

/// What a queued waiter does once a refresh settles without succeeding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaiterPolicy {
    /// Resubmit anyway; the resubmission will typically fail with its own 401.
    #[default]
    Resubmit,
    /// Return the refresh failure without resubmitting.
    FailFast,
}

/// How a refresh settled, broadcast to every waiter.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Succeeded,
    Failed(Arc<Error>),
    Abandoned,
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Succeeded => "succeeded",
            RefreshOutcome::Failed(_) => "failed",
            RefreshOutcome::Abandoned => "abandoned",
        }
    }
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum Role<'a> {
    Leader(RefreshLease<'a>),
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

/// Single-flight controller for session refresh. One per authenticated client.
pub struct RefreshCoordinator {
    refresher: Arc<dyn Refresher>,
    policy: WaiterPolicy,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn Refresher>, policy: WaiterPolicy) -> Self {
        Self {
            refresher,
            policy,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn policy(&self) -> WaiterPolicy {
        self.policy
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of requests queued behind the pending refresh.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Recover a request that failed with 401.
    ///
    /// The request is marked as retry and handed to `resubmit` once the
    /// session has been refreshed (or, for waiters under `Resubmit`, once the
    /// refresh has settled at all). The leader returns `RefreshFailed` when
    /// its refresh call fails.
    pub async fn recover<F, Fut>(&self, request: HttpRequest, resubmit: F) -> Result<HttpResponse>
    where
        F: FnOnce(HttpRequest) -> Fut,
        Fut: Future<Output = Result<HttpResponse>>,
    {
        let request = request.into_retry();
        let key = request.key();

        match self.join() {
            Role::Waiter(outcome) => {
                debug!(key = %key, "refresh in progress, queueing request");
                let outcome = outcome.await.unwrap_or(RefreshOutcome::Abandoned);
                match (self.policy(), outcome) {
                    (WaiterPolicy::FailFast, RefreshOutcome::Failed(e)) => {
                        return Err(Error::RefreshFailed(e));
                    }
                    (WaiterPolicy::FailFast, RefreshOutcome::Abandoned) => {
                        return Err(Error::RefreshAbandoned);
                    }
                    (_, outcome) => {
                        debug!(key = %key, outcome = outcome.label(), "resubmitting queued request");
                    }
                }
                resubmit(request).await
            }
            Role::Leader(lease) => {
                info!(key = %key, "authorization expired, refreshing session");
                match self.refresher.refresh().await {
                    Ok(()) => {
                        lease.settle(RefreshOutcome::Succeeded);
                        resubmit(request).await
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "session refresh failed");
                        let e = Arc::new(e);
                        lease.settle(RefreshOutcome::Failed(e.clone()));
                        Err(Error::RefreshFailed(e))
                    }
                }
            }
        }
    }

    /// Become the leader or enqueue a waiter, atomically.
    fn join(&self) -> Role<'_> {
        let mut state = self.lock();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            telemetry::set_refresh_waiters(state.waiters.len());
            Role::Waiter(rx)
        } else {
            state.refreshing = true;
            Role::Leader(RefreshLease {
                coordinator: self,
                settled: false,
            })
        }
    }

    /// Return to idle and wake every waiter in enqueue order.
    ///
    /// The queue is taken in the same critical section that clears the flag,
    /// so a request arriving afterwards starts a new refresh instead of
    /// joining a drained queue.
    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        telemetry::record_refresh(outcome.label());
        telemetry::set_refresh_waiters(0);
        info!(
            outcome = outcome.label(),
            waiters = waiters.len(),
            "session refresh settled"
        );
        for waiter in waiters {
            // A waiter whose request future was dropped has nothing to resume
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leadership of the pending refresh; settles as `Abandoned` if dropped unsettled.
struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("refresh leader dropped before settling");
            self.coordinator.settle(RefreshOutcome::Abandoned);
        }
    }
}

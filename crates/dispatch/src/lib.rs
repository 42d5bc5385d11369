//! Request dispatch for the Recifit web client
//!
//! Layers two coordination concerns over a `transport::Transport`:
//!
//! 1. `RequestTracker` suppresses duplicate in-flight requests. A request
//!    whose `method:path` key is already pending is rejected with
//!    `Error::DuplicateRequest` before transmission, unless it is a retry or
//!    its key is on the exemption list.
//! 2. `RefreshCoordinator` serializes concurrent 401 responses behind a single
//!    session refresh, then resubmits each affected request marked as retry.
//!
//! `ClientSet` wires both into the two clients the web app uses: a
//! general-purpose client (deduplication only, also carries the refresh call)
//! and the authenticated API client (deduplication + refresh coordination).

pub mod client;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod refresh;
pub mod tracker;

mod telemetry;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientOptions, ClientSet};
pub use constants::*;
pub use coordinator::{RefreshCoordinator, RefreshOutcome, WaiterPolicy};
pub use error::{Error, Result};
pub use refresh::{Refresher, SessionRefresher};
pub use tracker::{PendingGuard, RequestTracker};

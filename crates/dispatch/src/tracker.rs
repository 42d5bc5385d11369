//! In-flight request tracking and duplicate suppression
//!
//! The tracker holds the set of request keys currently in flight. A request
//! whose key is already pending is rejected before transmission unless it is a
//! retry. Keys on the exemption list never enter the pending set, so
//! deduplication is effectively disabled for them.
//!
//! Check and registration happen under one lock in `admit`, and the returned
//! `PendingGuard` releases the key when dropped, so every registration is
//! paired with exactly one release even if the dispatch future is dropped.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;
use transport::RequestKey;

use crate::error::{Error, Result};

/// Pending set plus exemption list for one client context.
#[derive(Debug, Default)]
pub struct RequestTracker {
    exempt: HashSet<RequestKey>,
    pending: Mutex<HashSet<RequestKey>>,
}

impl RequestTracker {
    pub fn new(exempt: impl IntoIterator<Item = RequestKey>) -> Self {
        Self {
            exempt: exempt.into_iter().collect(),
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_exempt(&self, key: &RequestKey) -> bool {
        self.exempt.contains(key)
    }

    /// True iff `key` is not exempt, is already pending, and this is not a retry.
    pub fn should_block(&self, key: &RequestKey, is_retry: bool) -> bool {
        if is_retry || self.is_exempt(key) {
            return false;
        }
        self.lock().contains(key)
    }

    /// Insert `key` into the pending set. Exempt keys are ignored; repeated
    /// registration is a no-op.
    pub fn register(&self, key: &RequestKey) {
        if self.is_exempt(key) {
            return;
        }
        self.lock().insert(key.clone());
    }

    /// Remove `key` from the pending set. Exempt or absent keys are ignored.
    pub fn release(&self, key: &RequestKey) {
        if self.is_exempt(key) {
            return;
        }
        self.lock().remove(key);
    }

    /// Block check and registration as one step.
    ///
    /// Returns `DuplicateRequest` without registering anything when the key is
    /// blocked. Otherwise the key is registered and released when the returned
    /// guard drops.
    pub fn admit(&self, key: &RequestKey, is_retry: bool) -> Result<PendingGuard<'_>> {
        if !self.is_exempt(key) {
            let mut pending = self.lock();
            if !is_retry && pending.contains(key) {
                debug!(key = %key, "blocking duplicate request");
                return Err(Error::DuplicateRequest(key.clone()));
            }
            pending.insert(key.clone());
        }
        Ok(PendingGuard {
            tracker: self,
            key: key.clone(),
        })
    }

    pub fn is_pending(&self, key: &RequestKey) -> bool {
        self.lock().contains(key)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<RequestKey>> {
        // The set is always left consistent, so a poisoned lock is still usable
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its key from the tracker on drop.
#[derive(Debug)]
pub struct PendingGuard<'a> {
    tracker: &'a RequestTracker,
    key: RequestKey,
}

impl PendingGuard<'_> {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release(&self.key);
    }
}

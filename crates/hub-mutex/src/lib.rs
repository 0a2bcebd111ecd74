// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-endpoint single-flight mutex scope.
//!
//! Provides at-most-one concurrent build per endpoint key within this
//! process; correctness across processes relies on the driver's
//! `ifGenerationMatch`.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use hub_error::{HubError, HubErrorCode};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;

/// A set of active endpoint keys (`"<bucket>/<path>"`), guarding against
/// concurrent mutation of the same key within this process.
#[derive(Default)]
pub struct EndpointMutexScope {
    active: Mutex<HashSet<String>>,
}

impl EndpointMutexScope {
    /// Build an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under an exclusive hold on `key`.
    ///
    /// Returns a [`HubErrorCode::Conflict`] error if `key` is already held.
    /// Otherwise records the key, runs `work`, and releases the key once
    /// `work` settles — whether it completes normally or the future is
    /// dropped mid-flight (cancellation, panic unwinding).
    pub async fn try_acquire<F, Fut, T>(&self, key: impl Into<String>, work: F) -> Result<T, HubError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = key.into();
        {
            let mut active = self.active.lock().expect("endpoint mutex poisoned");
            if !active.insert(key.clone()) {
                return Err(HubError::new(
                    HubErrorCode::Conflict,
                    format!("a request for '{key}' is already in flight"),
                ));
            }
        }
        let _guard = ReleaseGuard { scope: self, key };
        Ok(work().await)
    }

    /// Whether `key` is currently held. Exposed for tests and diagnostics.
    pub fn is_held(&self, key: &str) -> bool {
        self.active.lock().expect("endpoint mutex poisoned").contains(key)
    }
}

struct ReleaseGuard<'a> {
    scope: &'a EndpointMutexScope,
    key: String,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.scope
            .active
            .lock()
            .expect("endpoint mutex poisoned")
            .remove(&self.key);
    }
}

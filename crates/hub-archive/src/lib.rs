// SPDX-License-Identifier: MIT OR Apache-2.0
//! Archival-restricted rename-on-overwrite policy for historical versioning.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use hub_core::history::HistoricalName;
use hub_core::object::ObjectKey;
use hub_error::{HubError, HubErrorCode};
use std::future::Future;

/// Outcome of attempting an archival rename before a write or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The current object was renamed to this historical path.
    Renamed(String),
    /// No prior object existed; nothing to archive (first write).
    NoPriorObject,
}

/// Compute the historical target name for `key`, stamped with
/// `unix_millis`.
pub fn historical_target(key: &ObjectKey, unix_millis: i64) -> HistoricalName {
    HistoricalName::generate(key.dirname(), key.basename(), unix_millis)
}

/// Attempt to rename the object currently at `key` to a freshly generated
/// historical name before it is overwritten or deleted.
///
/// `rename_fn` performs the actual driver rename from `key`'s current path
/// to the historical path it is given. A [`HubErrorCode::DoesNotExist`]
/// from `rename_fn` is swallowed — there was nothing to archive because
/// this is the first write — and reported as
/// [`ArchiveOutcome::NoPriorObject`]. Any other error propagates.
pub async fn rename_for_overwrite<F, Fut>(
    key: &ObjectKey,
    unix_millis: i64,
    rename_fn: F,
) -> Result<ArchiveOutcome, HubError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<(), HubError>>,
{
    let historical = historical_target(key, unix_millis);
    match rename_fn(historical.as_str().to_string()).await {
        Ok(()) => Ok(ArchiveOutcome::Renamed(historical.as_str().to_string())),
        Err(e) if e.code == HubErrorCode::DoesNotExist => Ok(ArchiveOutcome::NoPriorObject),
        Err(e) => Err(e),
    }
}

/// Whether an object-listing basename should be hidden from a
/// non-archival-aware listing (§4.10): true iff it is itself historical.
pub fn is_historical_basename(basename: &str) -> bool {
    HistoricalName::is_historical_basename(basename)
}

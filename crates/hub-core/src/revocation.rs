//! Revocation records: the per-bucket "oldest valid iat" floor.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A revocation floor for one bucket address.
///
/// Tokens whose `iat` is strictly less than `timestamp` are revoked.
/// Updated under a driver transaction with a "max-wins" rule: a write
/// never lowers an existing floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RevocationRecord {
    /// Oldest `iat` (unix seconds) still considered valid.
    pub timestamp: i64,
    /// Unix seconds the record was first created.
    pub create_date: i64,
    /// Unix seconds the record was last updated.
    pub update_date: i64,
}

impl RevocationRecord {
    /// Build the record resulting from a fresh `/revoke-all` call with no
    /// prior record.
    pub fn new(timestamp: i64, now: i64) -> Self {
        Self {
            timestamp,
            create_date: now,
            update_date: now,
        }
    }

    /// Merge an incoming revocation timestamp into an existing record,
    /// keeping the larger (max-wins) timestamp.
    ///
    /// Returns a new record; `update_date` advances to `now` only when the
    /// floor actually moves.
    pub fn merge(&self, incoming_timestamp: i64, now: i64) -> Self {
        if incoming_timestamp > self.timestamp {
            Self {
                timestamp: incoming_timestamp,
                create_date: self.create_date,
                update_date: now,
            }
        } else {
            *self
        }
    }

    /// Whether a token with the given `iat` is revoked by this floor.
    pub fn revokes(&self, iat: i64) -> bool {
        iat < self.timestamp
    }
}

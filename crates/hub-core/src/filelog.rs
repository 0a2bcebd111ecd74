//! File-log records: the append-only side effect of every mutation.

use crate::principal::Address;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The three actions a mutation can log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileLogAction {
    /// The object did not previously exist.
    Create,
    /// The object existed and was overwritten.
    Update,
    /// The object was removed.
    Delete,
}

/// An append-only record of one mutation, enqueued to the background
/// task queue alongside any backup path. Enqueuing is best-effort: a
/// failure to log must never fail the originating request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileLogRecord {
    /// The full object key that was mutated.
    pub path: String,
    /// The effective signer's address.
    pub asso_iss_address: Address,
    /// Which action occurred.
    pub action: FileLogAction,
    /// Size in bytes after the mutation (0 for delete).
    pub size: u64,
    /// Signed delta in bytes versus the prior size.
    pub size_change: i64,
    /// Unix seconds the mutation was recorded.
    pub create_dt: i64,
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! hub-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Stable domain types for the storage hub: principal addresses, object
//! keys and metadata, token payloads, scope entries, revocation and
//! blacklist records, file-log records, and historical-name helpers.
//!
//! If you only take one dependency from this workspace to talk to the
//! hub's data model, take this one.

/// Blacklist records and the per-operation blacklist check.
pub mod blacklist;
/// File-log records, the append-only side effect of every mutation.
pub mod filelog;
/// Historical-name construction and recognition for archival versioning.
pub mod history;
/// Object keys and the metadata the driver reports about them.
pub mod object;
/// Principal addresses: derivation from a public key and base58check codec.
pub mod principal;
/// Revocation records: the per-bucket "oldest valid iat" floor.
pub mod revocation;
/// Token payloads (outer and association) and scope entries.
pub mod token;

pub use blacklist::{BlacklistRecord, BlacklistType, PerformType};
pub use filelog::{FileLogAction, FileLogRecord};
pub use history::HistoricalName;
pub use object::{ObjectKey, ObjectMetadata};
pub use principal::Address;
pub use revocation::RevocationRecord;
pub use token::{AssociationToken, OuterToken, Scope, ScopeEntry};

/// Current data-model version embedded in persisted records.
pub const CONTRACT_VERSION: &str = "hub/v1";

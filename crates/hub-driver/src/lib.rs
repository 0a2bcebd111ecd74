#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The storage driver contract the hub consumes.
//!
//! No specific object-store SDK is implied; any backing store that can
//! satisfy conditional writes keyed by a monotonic per-object generation
//! can implement [`Driver`].

use async_trait::async_trait;
use bytes::Bytes;
use hub_core::blacklist::BlacklistType;
use hub_core::filelog::FileLogRecord;
use hub_core::object::ObjectMetadata;
use hub_core::principal::Address;
use hub_core::revocation::RevocationRecord;
use hub_error::HubError;

/// A page of `listFiles`/`listFilesStat` results plus an opaque
/// continuation token.
#[derive(Debug, Clone, Default)]
pub struct ListPage<T> {
    /// The entries in this page.
    pub entries: Vec<T>,
    /// Opaque continuation token, `None` when there are no further pages.
    pub page: Option<String>,
}

/// Parameters shared by both list operations.
#[derive(Debug, Clone)]
pub struct ListRequest {
    /// The prefix to list under, typically `"<bucket>/"`.
    pub path_prefix: String,
    /// Continuation token from a prior page, if any.
    pub page: Option<String>,
    /// Requested page size; the driver clamps this to `[1, config.pageSize]`.
    pub page_size: Option<u32>,
}

/// Parameters for a conditional write.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// The storage top-level (bucket) the key lives under.
    pub storage_top_level: String,
    /// The relative path within the bucket.
    pub path: String,
    /// The body to write.
    pub content: Bytes,
    /// MIME content type, already defaulted to `application/octet-stream`
    /// by the caller when absent.
    pub content_type: String,
    /// `If-Match` value, if the caller supplied one.
    pub if_match_tag: Option<String>,
    /// `If-None-Match` value; only `"*"` is meaningful.
    pub if_none_match_tag: Option<String>,
    /// The effective signer, attached to the resulting file-log record.
    pub asso_iss_address: Address,
}

/// Result of a successful conditional write.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// The object's public URL under the driver's own read prefix.
    pub public_url: String,
    /// The new object's ETag.
    pub etag: String,
    /// `newSize - oldSize` (old is 0 when the object did not previously exist).
    pub size_change: i64,
    /// The file-log record this write produced.
    pub file_log: FileLogRecord,
}

/// Parameters for a conditional delete.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    /// The storage top-level (bucket) the key lives under.
    pub storage_top_level: String,
    /// The relative path within the bucket.
    pub path: String,
    /// `If-Match` value, if the caller supplied one.
    pub if_match_tag: Option<String>,
    /// The effective signer, attached to the resulting file-log record.
    pub asso_iss_address: Address,
}

/// Parameters for a conditional rename (used by the archival policy).
#[derive(Debug, Clone)]
pub struct RenameRequest {
    /// The storage top-level (bucket) the key lives under.
    pub storage_top_level: String,
    /// The current relative path.
    pub path: String,
    /// The destination relative path.
    pub new_path: String,
    /// `If-Match` value, if the caller supplied one.
    pub if_match_tag: Option<String>,
    /// The effective signer, attached to the resulting file-log records.
    pub asso_iss_address: Address,
}

/// The storage driver contract the hub consumes (§4.7).
#[async_trait]
pub trait Driver: Send + Sync {
    /// One-shot initialization. A failure here is fatal to the process.
    async fn ensure_initialized(&self) -> Result<(), HubError>;

    /// List object names under a prefix.
    async fn list_files(&self, req: ListRequest) -> Result<ListPage<String>, HubError>;

    /// List objects with full metadata under a prefix.
    async fn list_files_stat(
        &self,
        req: ListRequest,
    ) -> Result<ListPage<(String, ObjectMetadata)>, HubError>;

    /// Stat a single object; a missing object reports `exists: false`
    /// rather than an error.
    async fn perform_stat(
        &self,
        storage_top_level: &str,
        path: &str,
    ) -> Result<ObjectMetadata, HubError>;

    /// Conditionally write an object, enforcing `ifMatchTag`/`ifNoneMatchTag`
    /// and binding the write to the object's current generation.
    async fn perform_write(&self, req: WriteRequest) -> Result<WriteResult, HubError>;

    /// Conditionally delete an object.
    async fn perform_delete(&self, req: DeleteRequest) -> Result<(), HubError>;

    /// Conditionally rename (copy + delete, or a native move) an object.
    async fn perform_rename(&self, req: RenameRequest) -> Result<(), HubError>;

    /// Read the revocation floor for `bucket_address`.
    async fn perform_read_auth_timestamp(
        &self,
        bucket_address: &Address,
    ) -> Result<Option<RevocationRecord>, HubError>;

    /// Monotonically upsert the revocation floor for `bucket_address`.
    async fn perform_write_auth_timestamp(
        &self,
        bucket_address: &Address,
        timestamp: i64,
        now: i64,
    ) -> Result<RevocationRecord, HubError>;

    /// Read the blacklist type for `address`, defaulting to `None`.
    async fn perform_read_blacklist_type(
        &self,
        address: &Address,
    ) -> Result<BlacklistType, HubError>;

    /// Best-effort enqueue of backup paths and file-log records. Must
    /// never fail the caller's request; implementations swallow their own
    /// errors and log them.
    async fn add_task_to_queue(&self, backup_paths: Vec<String>, file_logs: Vec<FileLogRecord>);

    /// The base URL this driver serves objects from, used to synthesize
    /// `publicURL` before the handler layer rewrites it to the configured
    /// `readURL`.
    fn get_read_url_prefix(&self) -> String;
}

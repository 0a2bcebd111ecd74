// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory storage driver for local development and tests.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use bytes::Bytes;
use hub_core::blacklist::BlacklistType;
use hub_core::filelog::{FileLogAction, FileLogRecord};
use hub_core::object::ObjectMetadata;
use hub_core::principal::Address;
use hub_core::revocation::RevocationRecord;
use hub_driver::{
    DeleteRequest, Driver, ListPage, ListRequest, RenameRequest, WriteRequest, WriteResult,
};
use hub_error::{HubError, HubErrorCode};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
struct StoredObject {
    content: Bytes,
    content_type: String,
    generation: u64,
    last_modified_date: i64,
}

impl StoredObject {
    fn metadata(&self) -> ObjectMetadata {
        ObjectMetadata {
            exists: true,
            etag: ObjectMetadata::etag_for(&self.content),
            content_type: self.content_type.clone(),
            content_length: self.content.len() as u64,
            last_modified_date: self.last_modified_date,
            generation: self.generation,
        }
    }
}

/// A single enqueue call recorded for inspection in tests.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    /// Backup paths passed to the enqueue call.
    pub backup_paths: Vec<String>,
    /// File-log records passed to the enqueue call.
    pub file_logs: Vec<FileLogRecord>,
}

/// An in-memory [`Driver`] backed by a `HashMap`, suitable for tests and
/// local development. Object generations increment monotonically per key;
/// nothing is persisted across process restarts.
#[derive(Debug)]
pub struct MockDriver {
    objects: Mutex<HashMap<String, StoredObject>>,
    revocations: Mutex<HashMap<String, RevocationRecord>>,
    blacklist: Mutex<HashMap<String, BlacklistType>>,
    queue: Mutex<Vec<QueuedTask>>,
    read_url_prefix: String,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new("https://mock-storage.local")
    }
}

impl MockDriver {
    /// Build a driver that synthesizes public URLs under `read_url_prefix`.
    pub fn new(read_url_prefix: impl Into<String>) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            revocations: Mutex::new(HashMap::new()),
            blacklist: Mutex::new(HashMap::new()),
            queue: Mutex::new(Vec::new()),
            read_url_prefix: read_url_prefix.into(),
        }
    }

    /// Directly set the blacklist type for `address`, bypassing the normal
    /// write path. Used by tests to seed state.
    pub fn seed_blacklist(&self, address: &Address, kind: BlacklistType) {
        self.blacklist
            .lock()
            .unwrap()
            .insert(address.as_str().to_string(), kind);
    }

    /// Snapshot of every `addTaskToQueue` call made so far, in order.
    pub fn queued_tasks(&self) -> Vec<QueuedTask> {
        self.queue.lock().unwrap().clone()
    }

    fn full_key(storage_top_level: &str, path: &str) -> String {
        format!("{storage_top_level}/{path}")
    }

    fn check_if_match(existing: Option<&StoredObject>, if_match_tag: &Option<String>) -> Result<(), HubError> {
        let Some(tag) = if_match_tag else {
            return Ok(());
        };
        if tag == "*" {
            return Ok(());
        }
        match existing {
            Some(obj) if obj.metadata().etag == *tag => Ok(()),
            Some(obj) => Err(precondition_failed(&obj.metadata().etag)),
            None => Err(precondition_failed("")),
        }
    }
}

fn precondition_failed(current_etag: &str) -> HubError {
    HubError::new(HubErrorCode::PreconditionFailed, "etag precondition failed")
        .with_context("etag", current_etag)
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[async_trait]
impl Driver for MockDriver {
    async fn ensure_initialized(&self) -> Result<(), HubError> {
        Ok(())
    }

    async fn list_files(&self, req: ListRequest) -> Result<ListPage<String>, HubError> {
        let page = self.list_files_stat(req).await?;
        Ok(ListPage {
            entries: page.entries.into_iter().map(|(name, _)| name).collect(),
            page: page.page,
        })
    }

    async fn list_files_stat(
        &self,
        req: ListRequest,
    ) -> Result<ListPage<(String, ObjectMetadata)>, HubError> {
        let objects = self.objects.lock().unwrap();
        let mut matching: Vec<_> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(&req.path_prefix))
            .map(|(key, obj)| {
                let suffix = key
                    .strip_prefix(&req.path_prefix)
                    .unwrap_or(key)
                    .to_string();
                (suffix, obj.metadata())
            })
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        let offset: usize = req
            .page
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);
        let page_size = req.page_size.unwrap_or(100).max(1) as usize;

        let entries: Vec<_> = matching.iter().skip(offset).take(page_size).cloned().collect();
        let next_offset = offset + entries.len();
        let next_page = if next_offset < matching.len() {
            Some(next_offset.to_string())
        } else {
            None
        };

        Ok(ListPage {
            entries,
            page: next_page,
        })
    }

    async fn perform_stat(
        &self,
        storage_top_level: &str,
        path: &str,
    ) -> Result<ObjectMetadata, HubError> {
        let key = Self::full_key(storage_top_level, path);
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .get(&key)
            .map(StoredObject::metadata)
            .unwrap_or(ObjectMetadata {
                exists: false,
                etag: String::new(),
                content_type: String::new(),
                content_length: 0,
                last_modified_date: 0,
                generation: 0,
            }))
    }

    async fn perform_write(&self, req: WriteRequest) -> Result<WriteResult, HubError> {
        let key = Self::full_key(&req.storage_top_level, &req.path);
        let mut objects = self.objects.lock().unwrap();
        let existing = objects.get(&key);

        Self::check_if_match(existing, &req.if_match_tag)?;
        if req.if_none_match_tag.as_deref() == Some("*") && existing.is_some() {
            return Err(precondition_failed(
                existing.map(|o| o.metadata().etag.clone()).unwrap_or_default().as_str(),
            ));
        }

        let old_size = existing.map(|o| o.content.len() as u64).unwrap_or(0);
        let action = if existing.is_some() {
            FileLogAction::Update
        } else {
            FileLogAction::Create
        };
        let next_generation = existing.map(|o| o.generation + 1).unwrap_or(1);
        let now = now_unix();

        let stored = StoredObject {
            content: req.content.clone(),
            content_type: req.content_type.clone(),
            generation: next_generation,
            last_modified_date: now,
        };
        let new_size = stored.content.len() as u64;
        let etag = stored.metadata().etag;
        objects.insert(key.clone(), stored);
        drop(objects);

        let file_log = FileLogRecord {
            path: key.clone(),
            asso_iss_address: req.asso_iss_address,
            action,
            size: new_size,
            size_change: new_size as i64 - old_size as i64,
            create_dt: now,
        };

        Ok(WriteResult {
            public_url: format!("{}/{key}", self.read_url_prefix),
            etag,
            size_change: file_log.size_change,
            file_log,
        })
    }

    async fn perform_delete(&self, req: DeleteRequest) -> Result<(), HubError> {
        let key = Self::full_key(&req.storage_top_level, &req.path);
        let removed = {
            let mut objects = self.objects.lock().unwrap();
            let existing = objects.get(&key);
            if existing.is_none() {
                return Err(HubError::does_not_exist(format!("no object at {key}")));
            }
            Self::check_if_match(existing, &req.if_match_tag)?;
            objects.remove(&key).expect("checked Some above")
        };

        let now = now_unix();
        let file_log = FileLogRecord {
            path: key,
            asso_iss_address: req.asso_iss_address,
            action: FileLogAction::Delete,
            size: 0,
            size_change: -(removed.content.len() as i64),
            create_dt: now,
        };
        self.add_task_to_queue(vec![], vec![file_log]).await;
        Ok(())
    }

    async fn perform_rename(&self, req: RenameRequest) -> Result<(), HubError> {
        let old_key = Self::full_key(&req.storage_top_level, &req.path);
        let new_key = Self::full_key(&req.storage_top_level, &req.new_path);
        let size = {
            let mut objects = self.objects.lock().unwrap();
            let existing = objects.get(&old_key);
            if existing.is_none() {
                return Err(HubError::does_not_exist(format!("no object at {old_key}")));
            }
            Self::check_if_match(existing, &req.if_match_tag)?;
            let moved = objects.remove(&old_key).expect("checked Some above");
            let size = moved.content.len() as u64;
            objects.insert(new_key.clone(), moved);
            size
        };

        let now = now_unix();
        let delete_log = FileLogRecord {
            path: old_key,
            asso_iss_address: req.asso_iss_address.clone(),
            action: FileLogAction::Delete,
            size: 0,
            size_change: -(size as i64),
            create_dt: now,
        };
        let create_log = FileLogRecord {
            path: new_key,
            asso_iss_address: req.asso_iss_address,
            action: FileLogAction::Create,
            size,
            size_change: size as i64,
            create_dt: now,
        };
        self.add_task_to_queue(vec![], vec![delete_log, create_log]).await;
        Ok(())
    }

    async fn perform_read_auth_timestamp(
        &self,
        bucket_address: &Address,
    ) -> Result<Option<RevocationRecord>, HubError> {
        Ok(self
            .revocations
            .lock()
            .unwrap()
            .get(bucket_address.as_str())
            .copied())
    }

    async fn perform_write_auth_timestamp(
        &self,
        bucket_address: &Address,
        timestamp: i64,
        now: i64,
    ) -> Result<RevocationRecord, HubError> {
        let mut revocations = self.revocations.lock().unwrap();
        let merged = match revocations.get(bucket_address.as_str()) {
            Some(existing) => existing.merge(timestamp, now),
            None => RevocationRecord::new(timestamp, now),
        };
        revocations.insert(bucket_address.as_str().to_string(), merged);
        Ok(merged)
    }

    async fn perform_read_blacklist_type(&self, address: &Address) -> Result<BlacklistType, HubError> {
        Ok(self
            .blacklist
            .lock()
            .unwrap()
            .get(address.as_str())
            .copied()
            .unwrap_or(BlacklistType::None))
    }

    async fn add_task_to_queue(&self, backup_paths: Vec<String>, file_logs: Vec<FileLogRecord>) {
        self.queue.lock().unwrap().push(QueuedTask {
            backup_paths,
            file_logs,
        });
    }

    fn get_read_url_prefix(&self) -> String {
        self.read_url_prefix.clone()
    }
}

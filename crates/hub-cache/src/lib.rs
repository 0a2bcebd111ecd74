// SPDX-License-Identifier: MIT OR Apache-2.0
//! Revocation-timestamp and blacklist TTL caches.
//!
//! Both caches share the same container shape: a `moka` async LRU with a
//! fixed entry TTL, read-through on miss, and a re-check against the cache
//! immediately before and after any driver write to survive races with a
//! concurrent setter.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use hub_core::blacklist::{BlacklistRecord, BlacklistType, PerformType};
use hub_core::principal::Address;
use hub_driver::Driver;
use hub_error::HubError;
use hub_retry::{retry_with_backoff, RetryPolicy};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Entry TTL for both caches: 15 minutes.
const CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// The per-bucket revocation-timestamp cache (§4.3).
pub struct RevocationCache<D> {
    cache: Cache<String, i64>,
    driver: Arc<D>,
}

impl<D: Driver> RevocationCache<D> {
    /// Build a cache with the given LRU capacity.
    pub fn new(capacity: u64, driver: Arc<D>) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(CACHE_TTL)
                .build(),
            driver,
        }
    }

    /// Read the current revocation floor for `addr`.
    ///
    /// Reads through to the driver on a cache miss; after the driver read,
    /// re-consults the cache and returns `max(driverValue, cachedValue)`
    /// so a concurrent `set_auth_timestamp` call never gets clobbered.
    pub async fn get_auth_timestamp(&self, addr: &Address) -> Result<i64, HubError> {
        let key = addr.as_str().to_string();
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }
        let driver_value = self
            .driver
            .perform_read_auth_timestamp(addr)
            .await?
            .map(|r| r.timestamp)
            .unwrap_or(0);
        let value = self.merge_with_cache(&key, driver_value).await;
        self.cache.insert(key, value).await;
        Ok(value)
    }

    /// Raise the revocation floor for `addr` to (at least) `new_timestamp`.
    ///
    /// Skips the driver write entirely when the cache already reflects a
    /// value at least as large — the write would be a max-wins no-op
    /// anyway. The driver write itself runs under
    /// [`RetryPolicy::revocation_write`].
    pub async fn set_auth_timestamp(
        &self,
        addr: &Address,
        new_timestamp: i64,
        now: i64,
    ) -> Result<i64, HubError> {
        let key = addr.as_str().to_string();
        if let Some(cached) = self.cache.get(&key).await {
            if cached >= new_timestamp {
                return Ok(cached);
            }
        }

        let policy = RetryPolicy::revocation_write();
        let record = retry_with_backoff(&policy, || {
            self.driver
                .perform_write_auth_timestamp(addr, new_timestamp, now)
        })
        .await
        .map_err(|exhausted| exhausted.last_error)?;

        let value = self.merge_with_cache(&key, record.timestamp).await;
        self.cache.insert(key, value).await;
        Ok(value)
    }

    async fn merge_with_cache(&self, key: &str, value: i64) -> i64 {
        match self.cache.get(key).await {
            Some(cached) if cached > value => cached,
            _ => value,
        }
    }
}

/// The per-address blacklist cache (§4.4).
pub struct BlacklistCache<D> {
    cache: Cache<String, BlacklistType>,
    driver: Arc<D>,
}

impl<D: Driver> BlacklistCache<D> {
    /// Build a cache with the given LRU capacity.
    pub fn new(capacity: u64, driver: Arc<D>) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(CACHE_TTL)
                .build(),
            driver,
        }
    }

    /// Whether `addr` is blacklisted for `perform_type`, per §4.4's table.
    pub async fn is_blacklisted(
        &self,
        addr: &Address,
        perform_type: PerformType,
    ) -> Result<bool, HubError> {
        let key = addr.as_str().to_string();
        let kind = match self.cache.get(&key).await {
            Some(kind) => kind,
            None => {
                let kind = self.driver.perform_read_blacklist_type(addr).await?;
                self.cache.insert(key, kind).await;
                kind
            }
        };
        Ok(BlacklistRecord { kind }.blocks(perform_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hub_core::filelog::FileLogRecord;
    use hub_core::object::ObjectMetadata;
    use hub_core::revocation::RevocationRecord;
    use hub_driver::{DeleteRequest, ListPage, ListRequest, RenameRequest, WriteRequest, WriteResult};
    use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
    use std::sync::Mutex;

    fn addr() -> Address {
        Address::from_public_key_bytes(b"test-address")
    }

    struct MockDriver {
        revocation: Mutex<Option<RevocationRecord>>,
        revocation_write_calls: AtomicU32,
        fail_next_writes: AtomicU32,
        blacklist: AtomicI64,
    }

    impl MockDriver {
        fn empty() -> Self {
            Self {
                revocation: Mutex::new(None),
                revocation_write_calls: AtomicU32::new(0),
                fail_next_writes: AtomicU32::new(0),
                blacklist: AtomicI64::new(0),
            }
        }

        fn with_blacklist(kind: BlacklistType) -> Self {
            let driver = Self::empty();
            driver.blacklist.store(kind as i64, Ordering::SeqCst);
            driver
        }
    }

    #[async_trait]
    impl Driver for MockDriver {
        async fn ensure_initialized(&self) -> Result<(), HubError> {
            Ok(())
        }

        async fn list_files(&self, _req: ListRequest) -> Result<ListPage<String>, HubError> {
            unimplemented!("not exercised by these tests")
        }

        async fn list_files_stat(
            &self,
            _req: ListRequest,
        ) -> Result<ListPage<(String, ObjectMetadata)>, HubError> {
            unimplemented!("not exercised by these tests")
        }

        async fn perform_stat(
            &self,
            _storage_top_level: &str,
            _path: &str,
        ) -> Result<ObjectMetadata, HubError> {
            unimplemented!("not exercised by these tests")
        }

        async fn perform_write(&self, _req: WriteRequest) -> Result<WriteResult, HubError> {
            unimplemented!("not exercised by these tests")
        }

        async fn perform_delete(&self, _req: DeleteRequest) -> Result<(), HubError> {
            unimplemented!("not exercised by these tests")
        }

        async fn perform_rename(&self, _req: RenameRequest) -> Result<(), HubError> {
            unimplemented!("not exercised by these tests")
        }

        async fn perform_read_auth_timestamp(
            &self,
            _bucket_address: &Address,
        ) -> Result<Option<RevocationRecord>, HubError> {
            Ok(*self.revocation.lock().unwrap())
        }

        async fn perform_write_auth_timestamp(
            &self,
            _bucket_address: &Address,
            timestamp: i64,
            now: i64,
        ) -> Result<RevocationRecord, HubError> {
            self.revocation_write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_writes.load(Ordering::SeqCst) > 0 {
                self.fail_next_writes.fetch_sub(1, Ordering::SeqCst);
                return Err(HubError::new(
                    hub_error::HubErrorCode::ServerError,
                    "transient driver conflict",
                ));
            }
            let mut guard = self.revocation.lock().unwrap();
            let merged = match *guard {
                Some(existing) => existing.merge(timestamp, now),
                None => RevocationRecord::new(timestamp, now),
            };
            *guard = Some(merged);
            Ok(merged)
        }

        async fn perform_read_blacklist_type(
            &self,
            _address: &Address,
        ) -> Result<BlacklistType, HubError> {
            Ok(BlacklistType::from_i32(self.blacklist.load(Ordering::SeqCst) as i32).unwrap())
        }

        async fn add_task_to_queue(
            &self,
            _backup_paths: Vec<String>,
            _file_logs: Vec<FileLogRecord>,
        ) {
        }

        fn get_read_url_prefix(&self) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn get_reads_through_on_miss() {
        let driver = MockDriver::empty();
        *driver.revocation.lock().unwrap() = Some(RevocationRecord::new(42, 1_000));
        let cache = RevocationCache::new(100, Arc::new(driver));
        assert_eq!(cache.get_auth_timestamp(&addr()).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn set_then_get_is_consistent() {
        let cache = RevocationCache::new(100, Arc::new(MockDriver::empty()));
        let result = cache.set_auth_timestamp(&addr(), 100, 1_000).await.unwrap();
        assert_eq!(result, 100);
        assert_eq!(cache.get_auth_timestamp(&addr()).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn set_skips_driver_write_when_cache_already_covers_it() {
        let driver = Arc::new(MockDriver::empty());
        let cache = RevocationCache::new(100, driver.clone());
        cache.set_auth_timestamp(&addr(), 100, 1_000).await.unwrap();
        let calls_before = driver.revocation_write_calls.load(Ordering::SeqCst);
        let result = cache.set_auth_timestamp(&addr(), 50, 2_000).await.unwrap();
        assert_eq!(result, 100); // unchanged, max-wins
        assert_eq!(
            driver.revocation_write_calls.load(Ordering::SeqCst),
            calls_before
        ); // no driver call made
    }

    #[tokio::test]
    async fn timestamp_is_non_decreasing_across_calls() {
        let cache = RevocationCache::new(100, Arc::new(MockDriver::empty()));
        let first = cache.set_auth_timestamp(&addr(), 50, 1_000).await.unwrap();
        let second = cache.set_auth_timestamp(&addr(), 30, 2_000).await.unwrap();
        let third = cache.set_auth_timestamp(&addr(), 90, 3_000).await.unwrap();
        assert_eq!(first, 50);
        assert_eq!(second, 50); // lower timestamp never regresses the floor
        assert_eq!(third, 90);
    }

    #[tokio::test]
    async fn retries_transient_driver_failure() {
        let driver = MockDriver::empty();
        driver.fail_next_writes.store(1, Ordering::SeqCst);
        let cache = RevocationCache::new(100, Arc::new(driver));
        let result = cache.set_auth_timestamp(&addr(), 77, 1_000).await.unwrap();
        assert_eq!(result, 77);
    }

    #[tokio::test]
    async fn blacklist_full_blocks_put() {
        let driver = MockDriver::with_blacklist(BlacklistType::Full);
        let cache = BlacklistCache::new(100, Arc::new(driver));
        assert!(cache
            .is_blacklisted(&addr(), PerformType::Put)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn blacklist_none_allows_everything() {
        let driver = MockDriver::with_blacklist(BlacklistType::None);
        let cache = BlacklistCache::new(100, Arc::new(driver));
        assert!(!cache
            .is_blacklisted(&addr(), PerformType::Delete)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn blacklist_write_only_allows_delete() {
        let driver = MockDriver::with_blacklist(BlacklistType::WriteOnly);
        let cache = BlacklistCache::new(100, Arc::new(driver));
        assert!(!cache
            .is_blacklisted(&addr(), PerformType::Delete)
            .await
            .unwrap());
        assert!(cache
            .is_blacklisted(&addr(), PerformType::Put)
            .await
            .unwrap());
    }
}

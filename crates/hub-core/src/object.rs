//! Object keys and the metadata a driver reports about a stored object.

use crate::principal::Address;
use md5::{Digest, Md5};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A fully-qualified object key: `<bucketAddress>/<relativePath>`.
///
/// `relativePath` must not contain `..` as a substring — the only path
/// sanity rule the hub enforces — and a trailing `/` on the input is
/// stripped before the key is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    bucket: Address,
    relative_path: String,
}

impl ObjectKey {
    /// Build an object key, rejecting a `relativePath` containing `..`.
    pub fn new(bucket: Address, relative_path: impl Into<String>) -> Result<Self, BadPathError> {
        let mut relative_path = relative_path.into();
        if relative_path.contains("..") {
            return Err(BadPathError);
        }
        while relative_path.ends_with('/') {
            relative_path.pop();
        }
        Ok(Self {
            bucket,
            relative_path,
        })
    }

    /// The owning bucket address.
    pub fn bucket(&self) -> &Address {
        &self.bucket
    }

    /// The relative path within the bucket.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// The full `<bucket>/<relativePath>` storage key.
    pub fn full_key(&self) -> String {
        format!("{}/{}", self.bucket, self.relative_path)
    }

    /// The basename: the final path segment.
    pub fn basename(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// The dirname: everything before the final `/`, or empty.
    pub fn dirname(&self) -> &str {
        match self.relative_path.rfind('/') {
            Some(idx) => &self.relative_path[..idx],
            None => "",
        }
    }
}

/// `relativePath` contained `..`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("path contains '..'")]
pub struct BadPathError;

/// Metadata the driver reports about a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObjectMetadata {
    /// Whether the object currently exists.
    pub exists: bool,
    /// `"` + lowercase-hex(md5(body)) + `"`.
    pub etag: String,
    /// MIME content type as supplied on write.
    pub content_type: String,
    /// Size in bytes.
    pub content_length: u64,
    /// Unix seconds of last modification.
    pub last_modified_date: i64,
    /// Monotonic version id, strictly increasing per key in the driver.
    pub generation: u64,
}

impl ObjectMetadata {
    /// Compute the ETag for a body: `"` + lowercase-hex(md5) + `"`.
    pub fn etag_for(body: &[u8]) -> String {
        let digest = Md5::digest(body);
        format!("\"{digest:x}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Address {
        Address::from_public_key_bytes(b"some pubkey bytes")
    }

    #[test]
    fn strips_trailing_slash() {
        let key = ObjectKey::new(addr(), "a/b/").unwrap();
        assert_eq!(key.relative_path(), "a/b");
    }

    #[test]
    fn rejects_dotdot() {
        assert!(ObjectKey::new(addr(), "a/../b").is_err());
    }

    #[test]
    fn basename_and_dirname() {
        let key = ObjectKey::new(addr(), "a/b/c.txt").unwrap();
        assert_eq!(key.basename(), "c.txt");
        assert_eq!(key.dirname(), "a/b");
    }

    #[test]
    fn basename_with_no_dir() {
        let key = ObjectKey::new(addr(), "file.txt").unwrap();
        assert_eq!(key.basename(), "file.txt");
        assert_eq!(key.dirname(), "");
    }

    #[test]
    fn full_key_joins_bucket_and_path() {
        let bucket = addr();
        let key = ObjectKey::new(bucket.clone(), "x/y").unwrap();
        assert_eq!(key.full_key(), format!("{bucket}/x/y"));
    }

    #[test]
    fn etag_is_quoted_lowercase_hex() {
        let etag = ObjectMetadata::etag_for(b"hello world");
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag.len(), 34); // 2 quotes + 32 hex chars
    }
}

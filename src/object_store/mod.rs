//! Object-store gateway: the abstraction over S3 used by the worker runtime,
//! enrichment producers, and DLQ archive path.

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("object-store connection error: {0}")]
    Connection(String),
    #[error("rejected key: {0}")]
    InvalidKey(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Abstracts S3-shaped object storage for production and tests alike.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object to a freshly created file under the configured
    /// temp directory. Rejects path-traversal keys before touching disk.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        temp_dir: &Path,
    ) -> Result<PathBuf, ObjectStoreError>;

    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;

    async fn list_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, ObjectStoreError>;

    /// Only ever called against the ingest bucket once a source object has
    /// been successfully indexed; never against the thumbnail bucket.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, ObjectStoreError>;
}

/// Best-effort temp-file cleanup. Never errors — a missing file is not a
/// cleanup failure.
pub fn cleanup_temp_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to clean up temp file");
        }
    }
}

/// Reject keys containing `..` segments or an absolute path component, and
/// verify the resolved local destination stays under `temp_dir`. This is the
/// one gate standing between adversarial object keys and path traversal.
pub fn resolve_temp_path(temp_dir: &Path, key: &str) -> Result<PathBuf, ObjectStoreError> {
    if key.contains("..") {
        return Err(ObjectStoreError::InvalidKey(format!(
            "key contains a parent-directory segment: {key}"
        )));
    }
    if Path::new(key).is_absolute() {
        return Err(ObjectStoreError::InvalidKey(format!(
            "key is an absolute path: {key}"
        )));
    }

    let safe_name = key.replace(['/', '\\'], "_");
    let candidate = temp_dir.join(format!("{}-{}", uuid::Uuid::new_v4(), safe_name));

    let temp_dir_abs = std::path::absolute(temp_dir).unwrap_or_else(|_| temp_dir.to_path_buf());
    let candidate_abs = std::path::absolute(&candidate).unwrap_or_else(|_| candidate.clone());
    if !candidate_abs.starts_with(&temp_dir_abs) {
        return Err(ObjectStoreError::InvalidKey(format!(
            "resolved path escapes temp dir: {key}"
        )));
    }

    Ok(candidate)
}

/// Canonical `<scheme>://bucket/key` URL form used throughout the index
/// document and artifact references.
pub fn object_url(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_directory_segment() {
        let dir = std::env::temp_dir();
        let result = resolve_temp_path(&dir, "documents/../../../etc/passwd");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_absolute_key() {
        let dir = std::env::temp_dir();
        let result = resolve_temp_path(&dir, "/etc/passwd");
        assert!(result.is_err());
    }

    #[test]
    fn accepts_ordinary_key_within_temp_dir() {
        let dir = std::env::temp_dir();
        let result = resolve_temp_path(&dir, "documents/road/ts-server3/report.pdf");
        assert!(result.is_ok());
        assert!(result.unwrap().starts_with(&dir));
    }

    #[test]
    fn object_url_uses_s3_scheme() {
        assert_eq!(object_url("bucket", "a/b.pdf"), "s3://bucket/a/b.pdf");
    }
}

//! In-memory [`ObjectStore`] fake used by processor and worker-runtime tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{resolve_temp_path, ObjectMetadata, ObjectStore, ObjectStoreError};

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, for test setup.
    pub async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), bytes);
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .await
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        temp_dir: &Path,
    ) -> Result<PathBuf, ObjectStoreError> {
        let dest = resolve_temp_path(temp_dir, key)?;
        let bytes = self
            .objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        tokio::fs::write(&dest, bytes).await?;
        Ok(dest)
    }

    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(super::object_url(bucket, key))
    }

    async fn list_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, ObjectStoreError> {
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        let objects = self.objects.lock().await;
        let bytes = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(ObjectMetadata {
            content_length: bytes.len() as u64,
            content_type: None,
            last_modified: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn download_writes_seeded_bytes_to_temp_dir() {
        let store = MemoryObjectStore::new();
        store.put("ingest", "documents/report.pdf", b"%PDF-1.4".to_vec()).await;
        let temp_dir = std::env::temp_dir();
        let path = store.download("ingest", "documents/report.pdf", &temp_dir).await.unwrap();
        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"%PDF-1.4");
        tokio::fs::remove_file(path).await.ok();
    }

    #[tokio::test]
    async fn download_missing_key_errors() {
        let store = MemoryObjectStore::new();
        let temp_dir = std::env::temp_dir();
        let result = store.download("ingest", "nope.pdf", &temp_dir).await;
        assert!(matches!(result, Err(ObjectStoreError::NotFound { .. })));
    }
}

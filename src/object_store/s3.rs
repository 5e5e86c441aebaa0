//! S3-backed [`ObjectStore`] implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{resolve_temp_path, ObjectMetadata, ObjectStore, ObjectStoreError};

/// Above this size, downloads would ideally use ranged multipart GETs;
/// the threshold is tracked for future tuning even though the current
/// implementation streams sequentially either way.
const MULTIPART_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        temp_dir: &Path,
    ) -> Result<PathBuf, ObjectStoreError> {
        let dest = resolve_temp_path(temp_dir, key)?;

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error().map(|s| s.is_no_such_key()) {
                Some(true) => ObjectStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                _ => ObjectStoreError::Connection(e.to_string()),
            })?;

        if resp.content_length().unwrap_or(0) as u64 > MULTIPART_THRESHOLD_BYTES {
            tracing::debug!(bucket, key, "large object, streaming download");
        }

        let mut body = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(&dest).await?;
        tokio::io::copy(&mut body, &mut file).await?;
        file.flush().await?;

        Ok(dest)
    }

    async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Connection(e.to_string()))?;

        Ok(super::object_url(bucket, key))
    }

    async fn list_by_prefix(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, ObjectStoreError> {
        let mut keys = Vec::new();
        let mut paginator = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| ObjectStoreError::Connection(e.to_string()))?;
            for obj in page.contents.unwrap_or_default() {
                if let Some(key) = obj.key {
                    keys.push(key);
                }
            }
        }

        Ok(keys)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error().map(|s| s.is_not_found()) {
                Some(true) => ObjectStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                _ => ObjectStoreError::Connection(e.to_string()),
            })?;

        Ok(ObjectMetadata {
            content_length: resp.content_length().unwrap_or(0) as u64,
            content_type: resp.content_type().map(str::to_string),
            last_modified: resp
                .last_modified()
                .and_then(|d| chrono::DateTime::from_timestamp(d.secs(), 0)),
        })
    }
}

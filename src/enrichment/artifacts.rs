//! Thumbnail/preview key scheme and upload, composing the object-store
//! gateway with the key functions below the way the reference crate's
//! `storage.rs` computes a path before writing to it.

use std::path::Path;
use std::sync::Arc;

use crate::model::PreviewPage;
use crate::object_store::{object_url, ObjectStore, ObjectStoreError};

/// `thumbnails/{fileStem}_{md5(key)[0:8]}_thumb.jpg` — the 8-char hash
/// disambiguates same-named files living in different source folders.
pub fn thumbnail_key(source_key: &str) -> String {
    let stem = Path::new(source_key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let digest = format!("{:x}", md5::compute(source_key.as_bytes()));
    let hash8 = &digest[..8];
    format!("thumbnails/{stem}_{hash8}_thumb.jpg")
}

/// `previews/{fileId}/page_{pageNumber}.jpg`.
pub fn preview_page_key(file_id: &str, page_number: u32) -> String {
    format!("previews/{file_id}/page_{page_number}.jpg")
}

/// `dlq-archive/YYYY/MM/DD/{messageId}.json`.
pub fn dlq_archive_key(message_id: &str, timestamp: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "dlq-archive/{}/{}.json",
        timestamp.format("%Y/%m/%d"),
        message_id
    )
}

pub struct ArtifactUploader {
    object_store: Arc<dyn ObjectStore>,
    thumbnail_bucket: String,
}

impl ArtifactUploader {
    pub fn new(object_store: Arc<dyn ObjectStore>, thumbnail_bucket: String) -> Self {
        Self {
            object_store,
            thumbnail_bucket,
        }
    }

    /// Upload a single generated thumbnail, returning its canonical URL and key.
    pub async fn upload_thumbnail(
        &self,
        source_key: &str,
        bytes: Vec<u8>,
    ) -> Result<(String, String), ObjectStoreError> {
        let key = thumbnail_key(source_key);
        let url = self
            .object_store
            .upload_bytes(&self.thumbnail_bucket, &key, bytes, "image/jpeg")
            .await?;
        Ok((url, key))
    }

    /// Upload one rendered preview page, returning its page-metadata entry.
    pub async fn upload_preview_page(
        &self,
        file_id: &str,
        page_number: u32,
        bytes: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<PreviewPage, ObjectStoreError> {
        let key = preview_page_key(file_id, page_number);
        let size = bytes.len() as u64;
        self.object_store
            .upload_bytes(&self.thumbnail_bucket, &key, bytes, "image/jpeg")
            .await?;
        Ok(PreviewPage {
            page: page_number,
            s3_key: key,
            width,
            height,
            size,
        })
    }

    pub fn thumbnail_bucket(&self) -> &str {
        &self.thumbnail_bucket
    }
}

pub fn thumbnail_url(thumbnail_bucket: &str, source_key: &str) -> String {
    object_url(thumbnail_bucket, &thumbnail_key(source_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumbnail_key_includes_stem_and_8char_hash() {
        let key = thumbnail_key("documents/road/ts-server3/R06_JOB/report.pdf");
        assert!(key.starts_with("thumbnails/report_"));
        assert!(key.ends_with("_thumb.jpg"));
        // thumbnails/report_<8 hex chars>_thumb.jpg
        let hash_part = key
            .strip_prefix("thumbnails/report_")
            .unwrap()
            .strip_suffix("_thumb.jpg")
            .unwrap();
        assert_eq!(hash_part.len(), 8);
    }

    #[test]
    fn thumbnail_key_disambiguates_same_stem_different_folders() {
        let a = thumbnail_key("documents/road/ts-server3/A/report.pdf");
        let b = thumbnail_key("documents/road/ts-server3/B/report.pdf");
        assert_ne!(a, b);
    }

    #[test]
    fn preview_page_key_shape() {
        assert_eq!(preview_page_key("file-123", 2), "previews/file-123/page_2.jpg");
    }

    #[test]
    fn dlq_archive_key_shape() {
        use chrono::TimeZone;
        let ts = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(dlq_archive_key("abc-123", ts), "dlq-archive/2026/01/05/abc-123.json");
    }
}

//! The primary worker loop: drain the broker, route each file to a
//! processor, enrich and index the result, and always delete the message
//! regardless of outcome — the broker is a delivery mechanism, not a
//! system of record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::broker::{Broker, Message};
use crate::config::Config;
use crate::enrichment::artifacts::{thumbnail_key, ArtifactUploader};
use crate::enrichment::embedding::EmbeddingClient;
use crate::enrichment::path_metadata::extract_path_metadata;
use crate::error::ProcessingError;
use crate::index::IndexGateway;
use crate::model::{IndexedDocument, PreviewPage, ProcessingResult, ProcessingStatus, RawFileEvent};
use crate::object_store::{cleanup_temp_file, object_url, ObjectStore};
use crate::processor::ProcessorRegistry;
use crate::resource::ResourceMonitor;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".tif", ".tiff", ".bmp"];

pub struct WorkerRuntime {
    config: Config,
    broker: Arc<dyn Broker>,
    object_store: Arc<dyn ObjectStore>,
    registry: ProcessorRegistry,
    index: Arc<dyn IndexGateway>,
    artifacts: ArtifactUploader,
    embeddings: EmbeddingClient,
    shutdown: Arc<AtomicBool>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub processed: u64,
    pub indexed: u64,
    pub dropped_unsupported: u64,
    pub sent_to_dlq: u64,
}

enum MessageOutcome {
    Indexed,
    DroppedUnsupported,
    Failed(ProcessingError),
}

impl WorkerRuntime {
    pub fn new(
        config: Config,
        broker: Arc<dyn Broker>,
        object_store: Arc<dyn ObjectStore>,
        registry: ProcessorRegistry,
        index: Arc<dyn IndexGateway>,
    ) -> Self {
        let artifacts = ArtifactUploader::new(object_store.clone(), config.aws.thumbnail_bucket.clone());
        let embeddings = EmbeddingClient::new(
            config.thumbnail.image_embedding_lambda.clone(),
            config.processing.embedding_timeout,
        );
        Self {
            config,
            broker,
            object_store,
            registry,
            index,
            artifacts,
            embeddings,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Drain the broker until told to shut down. Each iteration receives a
    /// batch, fans it out across a bounded worker pool, and always deletes
    /// every received message before looping (the always-delete invariant).
    pub async fn run(self: Arc<Self>) -> RunSummary {
        let semaphore = Arc::new(Semaphore::new(self.config.processing.max_workers));
        let mut resource_monitor =
            ResourceMonitor::new(self.config.processing.resource_memory_high_water_percent as f32);
        let mut summary = RunSummary::default();
        let mut messages_since_sample: u64 = 0;

        while !self.shutdown.load(Ordering::Relaxed) {
            let batch = match self
                .broker
                .receive_batch(
                    self.config.processing.max_workers as u32,
                    self.config.aws.sqs_wait_time_seconds,
                    self.config.aws.sqs_visibility_timeout,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "failed to receive from broker; backing off");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            if batch.is_empty() {
                continue;
            }

            let mut handles = Vec::with_capacity(batch.len());
            for message in batch {
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
                let runtime = self.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = runtime.process_body(&message.body).await;
                    (message, outcome)
                }));
            }

            let mut receipt_handles = Vec::new();
            for handle in handles {
                let (message, outcome): (Message, MessageOutcome) = match handle.await {
                    Ok(v) => v,
                    Err(e) => {
                        error!(error = %e, "worker task panicked");
                        continue;
                    }
                };

                summary.processed += 1;
                match outcome {
                    MessageOutcome::Indexed => summary.indexed += 1,
                    MessageOutcome::DroppedUnsupported => summary.dropped_unsupported += 1,
                    MessageOutcome::Failed(err) => {
                        if err.retryable() {
                            if let Err(send_err) = self.broker.send_to_dlq(&message, &err.to_string()).await {
                                error!(error = %send_err, "failed to route message to DLQ");
                            } else {
                                summary.sent_to_dlq += 1;
                            }
                        } else {
                            warn!(error = %err, "unrecoverable processing error; dropping message");
                        }
                    }
                }
                receipt_handles.push(message.receipt_handle.clone());
            }

            if !receipt_handles.is_empty() {
                if let Err(e) = self.broker.delete_batch(&receipt_handles).await {
                    error!(error = %e, "failed to delete processed messages");
                }
            }

            messages_since_sample += summary.processed;
            if messages_since_sample >= self.config.processing.resource_sample_interval_messages {
                messages_since_sample = 0;
                let sample = resource_monitor.sample();
                info!(
                    metric = "ResourceSample",
                    rss_bytes = sample.rss_bytes,
                    used_percent = sample.used_percent,
                    "resource sample"
                );
            }
        }

        summary
    }

    async fn process_body(&self, body: &str) -> MessageOutcome {
        let raw: RawFileEvent = match serde_json::from_str(body) {
            Ok(raw) => raw,
            Err(e) => return MessageOutcome::Failed(ProcessingError::Validation(e.to_string())),
        };
        let event = match raw.into_source_event() {
            Ok(event) => event,
            Err(e) => return MessageOutcome::Failed(ProcessingError::Validation(e)),
        };

        let bucket = event.bucket(&self.config.aws.ingest_bucket_name);
        let key = event.raw_key().to_string();

        // Guard against ingesting our own generated artifacts as new work.
        if key.starts_with("thumbnails/") || key.starts_with("previews/") {
            return MessageOutcome::DroppedUnsupported;
        }

        let path = std::path::Path::new(&key);
        let processor = match self.registry.route(path) {
            Some(p) => p,
            None => {
                warn!(key = %key, "no processor claims this extension; dropping");
                return MessageOutcome::DroppedUnsupported;
            }
        };

        let local_path = match self
            .object_store
            .download(&bucket, &key, &self.config.processing.temp_dir)
            .await
        {
            Ok(p) => p,
            Err(e) => return MessageOutcome::Failed(ProcessingError::NotFound(e.to_string())),
        };

        let result = processor.process(&local_path, &key).await;
        cleanup_temp_file(&local_path);

        if !result.success {
            let message = result.error_message.unwrap_or_else(|| "processing failed".to_string());
            return MessageOutcome::Failed(ProcessingError::ProcessingFailure(message));
        }

        let doc = self.build_document(&bucket, &key, event.original_path(), &result).await;

        match self.index.index_document(&key, &doc).await {
            Ok(()) => MessageOutcome::Indexed,
            Err(e) => MessageOutcome::Failed(ProcessingError::IndexUnavailable(e.to_string())),
        }
    }

    async fn build_document(
        &self,
        bucket: &str,
        key: &str,
        original_path: Option<&str>,
        result: &ProcessingResult,
    ) -> IndexedDocument {
        let path_metadata = extract_path_metadata(key, original_path);
        let now = Utc::now();

        let (thumbnail_url, thumbnail_s3_key) = match &result.thumbnail_bytes {
            Some(bytes) => match self.artifacts.upload_thumbnail(key, bytes.clone()).await {
                Ok((url, uploaded_key)) => (Some(url), Some(uploaded_key)),
                Err(e) => {
                    warn!(key = %key, error = %e, "thumbnail upload failed; indexing without it");
                    (None, None)
                }
            },
            None => (None, None),
        };

        let image_vector = if self.should_embed(&result.file_type) {
            let image_url = thumbnail_url
                .clone()
                .unwrap_or_else(|| object_url(self.artifacts.thumbnail_bucket(), &thumbnail_key(key)));
            self.embeddings.generate(&image_url, None).await
        } else {
            None
        };

        IndexedDocument {
            file_id: format!("{:x}", Sha256::digest(format!("{bucket}/{key}").as_bytes())),
            file_name: result.file_name.clone(),
            file_path: object_url(bucket, key),
            file_key: key.to_string(),
            bucket: bucket.to_string(),
            file_extension: result.file_type.clone(),
            mime_type: result.mime_type.clone(),
            file_size: result.file_size,
            created_at: None,
            modified_at: None,
            indexed_at: now,
            processed_at: now,
            extracted_text: result.extracted_text.clone(),
            content: result.extracted_text.clone(),
            page_count: result.page_count,
            word_count: result.word_count,
            char_count: result.char_count,
            path_metadata,
            thumbnail_url,
            thumbnail_s3_key,
            preview_images: None::<Vec<PreviewPage>>,
            total_pages: result.page_count,
            preview_generated_at: None,
            image_vector: image_vector.as_ref().map(|v| v.vector.clone()),
            vector_dimension: image_vector.as_ref().map(|v| v.dimension as u32),
            vector_model: image_vector.as_ref().map(|_| "image-embedding-v1".to_string()),
            vector_updated_at: image_vector.as_ref().map(|_| now),
            ocr_text: (!result.extracted_text.is_empty()).then(|| result.extracted_text.clone()),
            ocr_confidence: result.ocr_confidence,
            ocr_language: result.ocr_language.clone(),
            processing_status: ProcessingStatus::Completed,
            error_message: None,
            success: true,
            processor_name: result.processor_name.clone(),
            processor_version: result.processor_version.clone(),
            processing_time_seconds: result.processing_time_seconds,
        }
    }

    fn should_embed(&self, file_type: &str) -> bool {
        self.config.thumbnail.enable_image_embedding && IMAGE_EXTENSIONS.contains(&file_type)
    }
}

//! End-to-end exercises of the worker runtime against in-memory fakes:
//! routing, path-derived category metadata, the always-delete invariant,
//! and DLQ hand-off on a downstream index failure.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fileindex_worker::broker::MemoryBroker;
use fileindex_worker::config::{
    AwsConfig, Config, DlqConfig, LoggingConfig, PreviewConfig, ProcessingConfig, ThumbnailConfig,
};
use fileindex_worker::index::{BulkResult, IndexError, IndexGateway, MemoryIndexGateway, SearchHit, SearchResults};
use fileindex_worker::model::{IndexedDocument, ProcessingResult};
use fileindex_worker::object_store::MemoryObjectStore;
use fileindex_worker::processor::{lowercase_extension, Processor, ProcessorRegistry};
use fileindex_worker::worker_runtime::WorkerRuntime;
use futures::stream::{self, BoxStream};
use serde_json::Value;

/// Claims `.pdf` and returns canned extracted text, standing in for the
/// real `pdftotext`/`pdftoppm`-shelling processor so these tests don't
/// depend on external binaries being installed.
struct StubPdfProcessor;

#[async_trait]
impl Processor for StubPdfProcessor {
    fn can_process(&self, path: &Path) -> bool {
        lowercase_extension(path) == ".pdf"
    }

    async fn process(&self, _path: &Path, original_key: &str) -> ProcessingResult {
        ProcessingResult {
            success: true,
            file_name: original_key.rsplit('/').next().unwrap_or(original_key).to_string(),
            file_size: 8,
            file_type: ".pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            extracted_text: "hello world".to_string(),
            word_count: 2,
            char_count: 11,
            processor_name: "StubPdfProcessor".to_string(),
            processor_version: "test".to_string(),
            ..Default::default()
        }
    }

    fn name(&self) -> &'static str {
        "StubPdfProcessor"
    }
}

/// Index gateway that always fails the write, simulating a down search
/// cluster for the DLQ hand-off scenario.
#[derive(Default)]
struct FailingIndexGateway;

#[async_trait]
impl IndexGateway for FailingIndexGateway {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn index_document(&self, _id: &str, _doc: &IndexedDocument) -> Result<(), IndexError> {
        Err(IndexError::Connection("OpenSearch connection refused".to_string()))
    }

    async fn bulk_index(&self, _docs: &[(String, IndexedDocument)]) -> Result<BulkResult, IndexError> {
        Ok(BulkResult::default())
    }

    async fn update_document(&self, _id: &str, _partial: &Value) -> Result<(), IndexError> {
        Ok(())
    }

    async fn search(&self, _query: &str, _size: u32, _from: u32) -> Result<SearchResults, IndexError> {
        Ok(SearchResults::default())
    }

    async fn vector_search(&self, _vector: &[f32], _k: u32) -> Result<SearchResults, IndexError> {
        Ok(SearchResults::default())
    }

    async fn hybrid_search(
        &self,
        _query: &str,
        _vector: &[f32],
        _text_weight: f32,
        _vector_weight: f32,
        _size: u32,
    ) -> Result<SearchResults, IndexError> {
        Ok(SearchResults::default())
    }

    fn scroll(&self, _query: Value, _page_size: u32) -> BoxStream<'_, Result<SearchHit, IndexError>> {
        Box::pin(stream::empty())
    }

    async fn count_by_query(&self, _query: &Value) -> Result<u64, IndexError> {
        Ok(0)
    }

    async fn refresh(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

fn test_config(temp_dir: std::path::PathBuf) -> Config {
    Config {
        aws: AwsConfig {
            region: "ap-northeast-1".to_string(),
            ingest_bucket: "ingest".to_string(),
            thumbnail_bucket: "thumbnails".to_string(),
            queue_url: "https://sqs.example/queue".to_string(),
            dlq_queue_url: None,
            preview_queue_url: None,
            dlq_archive_bucket: "dlq-archive".to_string(),
            opensearch_endpoint: "https://search.example".to_string(),
            opensearch_index: "file-index".to_string(),
            ingest_bucket_name: "ingest".to_string(),
            sqs_wait_time_seconds: 1,
            sqs_visibility_timeout: 30,
        },
        processing: ProcessingConfig {
            max_workers: 4,
            temp_dir,
            embedding_timeout: Duration::from_secs(5),
            converter_timeout: Duration::from_secs(5),
            resource_memory_high_water_percent: 95,
            resource_sample_interval_messages: 1_000_000,
        },
        thumbnail: ThumbnailConfig {
            enable_image_embedding: false,
            image_embedding_lambda: None,
        },
        preview: PreviewConfig {
            dpi: 150,
            max_width: 800,
            max_height: 800,
            quality: 80,
            max_pages: 10,
        },
        dlq: DlqConfig {
            min_age_seconds: 300,
            max_retries: 3,
        },
        logging: LoggingConfig {
            level: "error".to_string(),
        },
    }
}

fn registry() -> ProcessorRegistry {
    ProcessorRegistry::new(vec![
        Box::new(StubPdfProcessor),
        Box::new(fileindex_worker::processor::processors::MetadataOnlyProcessor),
    ])
}

/// Runs the worker loop until the primary queue drains, then signals
/// shutdown and waits for the loop to return its summary.
async fn drain(runtime: Arc<WorkerRuntime>, broker: Arc<MemoryBroker>) -> fileindex_worker::worker_runtime::RunSummary {
    let shutdown = runtime.shutdown_flag();
    let handle = tokio::spawn(runtime.run());

    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if broker.primary_len().await == 0 {
            break;
        }
    }
    shutdown.store(true, Ordering::Relaxed);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker loop did not shut down in time")
        .expect("worker task panicked")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn happy_path_pdf_ingest_derives_category_and_deletes_message() {
    let temp = tempfile::tempdir().unwrap();
    let key = "documents/road/ts-server3/R06_JOB/sub/report.pdf";

    let broker = Arc::new(MemoryBroker::new());
    let object_store = Arc::new(MemoryObjectStore::new());
    let index = Arc::new(MemoryIndexGateway::new());

    object_store.put("ingest", key, b"%PDF-1.4 stub".to_vec()).await;
    broker
        .push(serde_json::json!({"bucket": "ingest", "key": key}).to_string())
        .await;

    let config = test_config(temp.path().to_path_buf());
    let runtime = Arc::new(WorkerRuntime::new(config, broker.clone(), object_store, registry(), index.clone()));

    let summary = drain(runtime, broker.clone()).await;
    assert_eq!(summary.indexed, 1);
    assert_eq!(broker.primary_len().await, 0);
    assert!(broker.dlq_contents().await.is_empty());

    let doc = index.get(key).await.expect("document should be indexed");
    assert_eq!(doc["category"], "road");
    assert_eq!(doc["categoryDisplay"], "道路");
    assert_eq!(doc["nasServer"], "ts-server3");
    assert_eq!(doc["rootFolder"], "R06_JOB");
    assert_eq!(doc["nasPath"], "\\\\ts-server3\\share\\R06_JOB\\sub\\report.pdf");
    assert_eq!(doc["extractedText"], "hello world");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn url_encoded_key_is_decoded_before_indexing() {
    let temp = tempfile::tempdir().unwrap();
    let decoded_key = "documents/road/ts-server3/R06_JOB/図面.pdf";
    let encoded_key = "documents/road/ts-server3/R06_JOB/%E5%9B%B3%E9%9D%A2.pdf";

    let broker = Arc::new(MemoryBroker::new());
    let object_store = Arc::new(MemoryObjectStore::new());
    let index = Arc::new(MemoryIndexGateway::new());

    object_store.put("ingest", decoded_key, b"%PDF-1.4 stub".to_vec()).await;
    broker
        .push(serde_json::json!({"bucket": "ingest", "key": encoded_key}).to_string())
        .await;

    let config = test_config(temp.path().to_path_buf());
    let runtime = Arc::new(WorkerRuntime::new(config, broker.clone(), object_store, registry(), index.clone()));

    let summary = drain(runtime, broker.clone()).await;
    assert_eq!(summary.indexed, 1);

    let doc = index.get(decoded_key).await.expect("decoded key should be the document id");
    assert_eq!(doc["fileKey"], decoded_key);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn category_correction_overrides_path_segment_for_known_server() {
    let temp = tempfile::tempdir().unwrap();
    let key = "documents/road/ts-server6/H22/foo.pdf";

    let broker = Arc::new(MemoryBroker::new());
    let object_store = Arc::new(MemoryObjectStore::new());
    let index = Arc::new(MemoryIndexGateway::new());

    object_store.put("ingest", key, b"%PDF-1.4 stub".to_vec()).await;
    broker
        .push(serde_json::json!({"bucket": "ingest", "key": key}).to_string())
        .await;

    let config = test_config(temp.path().to_path_buf());
    let runtime = Arc::new(WorkerRuntime::new(config, broker.clone(), object_store, registry(), index.clone()));

    drain(runtime, broker.clone()).await;

    let doc = index.get(key).await.expect("document should be indexed");
    assert_eq!(doc["category"], "structure");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsupported_format_is_dropped_without_index_write_or_dlq_entry() {
    let temp = tempfile::tempdir().unwrap();
    let key = "documents/road/ts-server3/R06_JOB/report.dwg";

    let broker = Arc::new(MemoryBroker::new());
    let object_store = Arc::new(MemoryObjectStore::new());
    let index = Arc::new(MemoryIndexGateway::new());

    object_store.put("ingest", key, b"binary cad data".to_vec()).await;
    broker
        .push(serde_json::json!({"bucket": "ingest", "key": key}).to_string())
        .await;

    let config = test_config(temp.path().to_path_buf());
    let runtime = Arc::new(WorkerRuntime::new(config, broker.clone(), object_store, registry(), index.clone()));

    let summary = drain(runtime, broker.clone()).await;
    assert_eq!(summary.dropped_unsupported, 1);
    assert_eq!(summary.indexed, 0);
    assert_eq!(broker.primary_len().await, 0);
    assert!(broker.dlq_contents().await.is_empty());
    assert_eq!(index.len().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn index_cluster_failure_sends_message_to_dlq_with_descriptive_reason() {
    let temp = tempfile::tempdir().unwrap();
    let key = "documents/road/ts-server3/R06_JOB/report.pdf";

    let broker = Arc::new(MemoryBroker::new());
    let object_store = Arc::new(MemoryObjectStore::new());
    let index: Arc<dyn IndexGateway> = Arc::new(FailingIndexGateway);

    object_store.put("ingest", key, b"%PDF-1.4 stub".to_vec()).await;
    broker
        .push(serde_json::json!({"bucket": "ingest", "key": key}).to_string())
        .await;

    let config = test_config(temp.path().to_path_buf());
    let runtime = Arc::new(WorkerRuntime::new(config, broker.clone(), object_store, registry(), index));

    let summary = drain(runtime, broker.clone()).await;
    assert_eq!(summary.sent_to_dlq, 1);
    assert_eq!(broker.primary_len().await, 0);

    let dlq = broker.dlq_contents().await;
    assert_eq!(dlq.len(), 1);
    let error_message = dlq[0].attributes.get("ErrorMessage").expect("DLQ entry should carry an error reason");
    assert!(
        error_message.contains("OpenSearch") || error_message.to_lowercase().contains("index"),
        "unexpected DLQ error message: {error_message}"
    );
}

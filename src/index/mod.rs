//! Index gateway: the search-cluster contract (OpenSearch/Elasticsearch
//! REST-compatible). A thin `reqwest`-based wrapper, matching the
//! reference crate's existing HTTP client choice rather than introducing
//! a dedicated OpenSearch client dependency.

mod memory;
mod opensearch;

pub use memory::MemoryIndexGateway;
pub use opensearch::OpenSearchIndexGateway;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::model::IndexedDocument;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search cluster connection error: {0}")]
    Connection(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("search cluster returned an error response: {0}")]
    ClusterError(String),
}

#[derive(Debug, Clone, Default)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub source: Value,
    pub highlight: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Owns the search-cluster contract: indexing, partial update, query,
/// scroll, and mapping management.
#[async_trait]
pub trait IndexGateway: Send + Sync {
    /// Create the index with its fixed mapping if it does not already exist.
    async fn ensure_index(&self) -> Result<(), IndexError>;

    async fn index_document(&self, id: &str, doc: &IndexedDocument) -> Result<(), IndexError>;

    async fn bulk_index(&self, docs: &[(String, IndexedDocument)]) -> Result<BulkResult, IndexError>;

    async fn update_document(&self, id: &str, partial: &Value) -> Result<(), IndexError>;

    async fn search(&self, query: &str, size: u32, from: u32) -> Result<SearchResults, IndexError>;

    async fn vector_search(&self, vector: &[f32], k: u32) -> Result<SearchResults, IndexError>;

    async fn hybrid_search(
        &self,
        query: &str,
        vector: &[f32],
        text_weight: f32,
        vector_weight: f32,
        size: u32,
    ) -> Result<SearchResults, IndexError>;

    /// Scroll through every hit matching `query`, `page_size` at a time.
    /// Implementations must not fall back to `from`+`size` beyond the
    /// search cluster's default 10k-result window.
    fn scroll(&self, query: Value, page_size: u32) -> BoxStream<'_, Result<SearchHit, IndexError>>;

    async fn count_by_query(&self, query: &Value) -> Result<u64, IndexError>;

    async fn refresh(&self) -> Result<(), IndexError>;
}

#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    pub success: u64,
    pub failed: u64,
}

/// Build the fixed index mapping: Japanese-analyzed text fields, unanalyzed
/// keyword identity fields, and a dense k-NN vector field for `imageVector`.
pub fn index_mapping_body(vector_dimension: u32, shards: u32, replicas: u32) -> Value {
    serde_json::json!({
        "settings": {
            "index": {
                "number_of_shards": shards,
                "number_of_replicas": replicas,
                "refresh_interval": "5s",
                "knn": true
            },
            "analysis": {
                "analyzer": {
                    "japanese_analyzer": {
                        "type": "custom",
                        "tokenizer": "kuromoji_tokenizer",
                        "filter": [
                            "kuromoji_baseform",
                            "kuromoji_part_of_speech",
                            "kuromoji_stemmer",
                            "cjk_width",
                            "lowercase"
                        ]
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "fileId": {"type": "keyword"},
                "fileName": {
                    "type": "text", "analyzer": "japanese_analyzer",
                    "fields": {"keyword": {"type": "keyword"}}
                },
                "filePath": {
                    "type": "text", "analyzer": "japanese_analyzer",
                    "fields": {"keyword": {"type": "keyword"}}
                },
                "fileKey": {"type": "keyword"},
                "bucket": {"type": "keyword"},
                "fileExtension": {"type": "keyword"},
                "mimeType": {"type": "keyword"},
                "fileSize": {"type": "long"},

                "createdAt": {"type": "date"},
                "modifiedAt": {"type": "date"},
                "indexedAt": {"type": "date"},
                "processedAt": {"type": "date"},

                "extractedText": {"type": "text", "analyzer": "japanese_analyzer"},
                "content": {"type": "text", "analyzer": "japanese_analyzer"},
                "pageCount": {"type": "integer"},
                "wordCount": {"type": "long"},
                "charCount": {"type": "long"},

                "category": {"type": "keyword"},
                "categoryDisplay": {"type": "keyword"},
                "nasServer": {"type": "keyword"},
                "rootFolder": {"type": "keyword"},
                "nasPath": {"type": "text", "analyzer": "japanese_analyzer"},

                "thumbnailUrl": {"type": "keyword"},
                "thumbnailS3Key": {"type": "keyword"},
                "previewImages": {"type": "object", "enabled": true},
                "totalPages": {"type": "integer"},
                "previewGeneratedAt": {"type": "date"},

                "imageVector": {
                    "type": "knn_vector",
                    "dimension": vector_dimension,
                    "method": {
                        "name": "hnsw",
                        "space_type": "cosinesimil",
                        "engine": "nmslib"
                    }
                },
                "vectorDimension": {"type": "integer"},
                "vectorModel": {"type": "keyword"},
                "vectorUpdatedAt": {"type": "date"},

                "ocrText": {"type": "text", "analyzer": "japanese_analyzer"},
                "ocrConfidence": {"type": "float"},
                "ocrLanguage": {"type": "keyword"},

                "processingStatus": {"type": "keyword"},
                "errorMessage": {"type": "text"},
                "success": {"type": "boolean"},

                "processorName": {"type": "keyword"},
                "processorVersion": {"type": "keyword"},
                "processingTimeSeconds": {"type": "float"}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_sets_knn_vector_dimension() {
        let body = index_mapping_body(512, 2, 1);
        assert_eq!(
            body["mappings"]["properties"]["imageVector"]["dimension"],
            512
        );
        assert_eq!(body["settings"]["index"]["number_of_shards"], 2);
    }
}

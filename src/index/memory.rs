//! In-memory `IndexGateway` fake backing unit and integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::model::IndexedDocument;

use super::{BulkResult, IndexError, IndexGateway, SearchHit, SearchResults};

#[derive(Default)]
pub struct MemoryIndexGateway {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryIndexGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Value> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl IndexGateway for MemoryIndexGateway {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn index_document(&self, id: &str, doc: &IndexedDocument) -> Result<(), IndexError> {
        let value = serde_json::to_value(doc).map_err(|e| IndexError::ClusterError(e.to_string()))?;
        self.documents.write().await.insert(id.to_string(), value);
        Ok(())
    }

    async fn bulk_index(&self, docs: &[(String, IndexedDocument)]) -> Result<BulkResult, IndexError> {
        let mut result = BulkResult::default();
        for (id, doc) in docs {
            match serde_json::to_value(doc) {
                Ok(value) => {
                    self.documents.write().await.insert(id.clone(), value);
                    result.success += 1;
                }
                Err(_) => result.failed += 1,
            }
        }
        Ok(result)
    }

    async fn update_document(&self, id: &str, partial: &Value) -> Result<(), IndexError> {
        let mut documents = self.documents.write().await;
        let existing = documents
            .get_mut(id)
            .ok_or_else(|| IndexError::NotFound(id.to_string()))?;
        if let (Some(existing_map), Some(partial_map)) = (existing.as_object_mut(), partial.as_object()) {
            for (key, value) in partial_map {
                existing_map.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn search(&self, query: &str, size: u32, from: u32) -> Result<SearchResults, IndexError> {
        let documents = self.documents.read().await;
        let query = query.to_lowercase();
        let matches: Vec<SearchHit> = documents
            .iter()
            .filter(|(_, doc)| doc.to_string().to_lowercase().contains(&query))
            .skip(from as usize)
            .take(size as usize)
            .map(|(id, doc)| SearchHit {
                id: id.clone(),
                score: 1.0,
                source: doc.clone(),
                highlight: None,
            })
            .collect();
        Ok(SearchResults {
            total: matches.len() as u64,
            hits: matches,
        })
    }

    async fn vector_search(&self, _vector: &[f32], k: u32) -> Result<SearchResults, IndexError> {
        let documents = self.documents.read().await;
        let hits: Vec<SearchHit> = documents
            .iter()
            .take(k as usize)
            .map(|(id, doc)| SearchHit {
                id: id.clone(),
                score: 1.0,
                source: doc.clone(),
                highlight: None,
            })
            .collect();
        Ok(SearchResults {
            total: hits.len() as u64,
            hits,
        })
    }

    async fn hybrid_search(
        &self,
        query: &str,
        vector: &[f32],
        _text_weight: f32,
        _vector_weight: f32,
        size: u32,
    ) -> Result<SearchResults, IndexError> {
        if query.is_empty() {
            return self.vector_search(vector, size).await;
        }
        self.search(query, size, 0).await
    }

    fn scroll(&self, query: Value, page_size: u32) -> BoxStream<'_, Result<SearchHit, IndexError>> {
        let needle = query
            .get("match_all")
            .map(|_| String::new())
            .or_else(|| query.as_str().map(str::to_string));

        stream::once(async move {
            let documents = self.documents.read().await;
            let mut hits: Vec<Result<SearchHit, IndexError>> = documents
                .iter()
                .filter(|(_, doc)| match &needle {
                    Some(n) if !n.is_empty() => doc.to_string().to_lowercase().contains(&n.to_lowercase()),
                    _ => true,
                })
                .map(|(id, doc)| {
                    Ok(SearchHit {
                        id: id.clone(),
                        score: 1.0,
                        source: doc.clone(),
                        highlight: None,
                    })
                })
                .collect();
            let _ = page_size;
            hits.reverse();
            stream::iter(hits)
        })
        .flatten()
        .boxed()
    }

    async fn count_by_query(&self, query: &Value) -> Result<u64, IndexError> {
        let results = self.scroll(query.clone(), 1000).collect::<Vec<_>>().await;
        Ok(results.into_iter().filter(Result::is_ok).count() as u64)
    }

    async fn refresh(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IndexedDocument, PathMetadata, ProcessingStatus};
    use chrono::Utc;

    fn sample_doc(id: &str) -> IndexedDocument {
        IndexedDocument {
            file_id: id.to_string(),
            file_name: format!("{id}.pdf"),
            file_path: id.to_string(),
            file_key: id.to_string(),
            bucket: "test-bucket".to_string(),
            file_extension: ".pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            file_size: 0,
            created_at: None,
            modified_at: None,
            indexed_at: Utc::now(),
            processed_at: Utc::now(),
            extracted_text: String::new(),
            content: String::new(),
            page_count: None,
            word_count: 0,
            char_count: 0,
            path_metadata: PathMetadata::default(),
            thumbnail_url: None,
            thumbnail_s3_key: None,
            preview_images: None,
            total_pages: None,
            preview_generated_at: None,
            image_vector: None,
            vector_dimension: None,
            vector_model: None,
            vector_updated_at: None,
            ocr_text: None,
            ocr_confidence: None,
            ocr_language: None,
            processing_status: ProcessingStatus::Completed,
            error_message: None,
            success: true,
            processor_name: "test".to_string(),
            processor_version: "1.0.0".to_string(),
            processing_time_seconds: 0.0,
        }
    }

    #[tokio::test]
    async fn index_then_get_round_trips() {
        let gateway = MemoryIndexGateway::new();
        gateway.index_document("a.pdf", &sample_doc("a.pdf")).await.unwrap();
        let stored = gateway.get("a.pdf").await.unwrap();
        assert_eq!(stored["fileName"], "a.pdf.pdf");
    }

    #[tokio::test]
    async fn scroll_yields_every_indexed_document() {
        let gateway = MemoryIndexGateway::new();
        for i in 0..5 {
            let id = format!("doc-{i}");
            gateway.index_document(&id, &sample_doc(&id)).await.unwrap();
        }
        let hits: Vec<_> = gateway
            .scroll(serde_json::json!({"match_all": {}}), 2)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn update_document_merges_fields() {
        let gateway = MemoryIndexGateway::new();
        gateway.index_document("a.pdf", &sample_doc("a.pdf")).await.unwrap();
        gateway
            .update_document("a.pdf", &serde_json::json!({"category": "road"}))
            .await
            .unwrap();
        let stored = gateway.get("a.pdf").await.unwrap();
        assert_eq!(stored["category"], "road");
    }

    #[tokio::test]
    async fn update_missing_document_errors() {
        let gateway = MemoryIndexGateway::new();
        let err = gateway
            .update_document("missing", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }
}

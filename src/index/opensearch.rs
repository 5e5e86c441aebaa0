//! `reqwest`-based REST client for an OpenSearch/Elasticsearch-compatible
//! cluster. No dedicated OpenSearch client crate is introduced; the
//! reference crate already standardises on `reqwest` + `rustls-tls` for
//! outbound HTTP, so the search cluster gets the same treatment as every
//! other HTTP collaborator in this system.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};

use crate::model::IndexedDocument;

use super::{index_mapping_body, BulkResult, IndexError, IndexGateway, SearchHit, SearchResults};

pub struct OpenSearchIndexGateway {
    client: reqwest::Client,
    endpoint: String,
    index: String,
    vector_dimension: u32,
}

impl OpenSearchIndexGateway {
    pub fn new(endpoint: String, index: String, vector_dimension: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build OpenSearch HTTP client");
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index,
            vector_dimension,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.endpoint, self.index, path)
    }

    async fn parse_response(resp: reqwest::Response) -> Result<Value, IndexError> {
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| IndexError::ClusterError(e.to_string()))?;
        if !status.is_success() {
            return Err(IndexError::ClusterError(format!("{status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl IndexGateway for OpenSearchIndexGateway {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        let exists = self
            .client
            .head(format!("{}/{}", self.endpoint, self.index))
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        if exists.status().is_success() {
            return Ok(());
        }

        let body = index_mapping_body(self.vector_dimension, 2, 1);
        let resp = self
            .client
            .put(format!("{}/{}", self.endpoint, self.index))
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        Self::parse_response(resp).await?;
        Ok(())
    }

    async fn index_document(&self, id: &str, doc: &IndexedDocument) -> Result<(), IndexError> {
        let resp = self
            .client
            .put(self.url(&format!("/_doc/{}", urlencoding::encode(id))))
            .json(doc)
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        Self::parse_response(resp).await?;
        Ok(())
    }

    async fn bulk_index(&self, docs: &[(String, IndexedDocument)]) -> Result<BulkResult, IndexError> {
        let mut body = String::new();
        for (id, doc) in docs {
            body.push_str(&json!({"index": {"_index": self.index, "_id": id}}).to_string());
            body.push('\n');
            body.push_str(&serde_json::to_string(doc).map_err(|e| IndexError::ClusterError(e.to_string()))?);
            body.push('\n');
        }

        let resp = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;

        let parsed = Self::parse_response(resp).await?;
        let mut result = BulkResult::default();
        if let Some(items) = parsed["items"].as_array() {
            for item in items {
                if item["index"]["error"].is_null() {
                    result.success += 1;
                } else {
                    result.failed += 1;
                }
            }
        } else {
            result.success = docs.len() as u64;
        }
        Ok(result)
    }

    async fn update_document(&self, id: &str, partial: &Value) -> Result<(), IndexError> {
        let resp = self
            .client
            .post(self.url(&format!("/_update/{}", urlencoding::encode(id))))
            .json(&json!({"doc": partial}))
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        Self::parse_response(resp).await?;
        Ok(())
    }

    async fn search(&self, query: &str, size: u32, from: u32) -> Result<SearchResults, IndexError> {
        let body = json!({
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["fileName^3", "content^2", "ocrText", "filePath"],
                    "fuzziness": "AUTO"
                }
            },
            "highlight": {"fields": {"extractedText": {}, "fileName": {}}},
            "size": size,
            "from": from
        });
        self.run_search(body).await
    }

    async fn vector_search(&self, vector: &[f32], k: u32) -> Result<SearchResults, IndexError> {
        let body = json!({
            "size": k,
            "query": {"knn": {"imageVector": {"vector": vector, "k": k}}}
        });
        self.run_search(body).await
    }

    async fn hybrid_search(
        &self,
        query: &str,
        vector: &[f32],
        text_weight: f32,
        vector_weight: f32,
        size: u32,
    ) -> Result<SearchResults, IndexError> {
        let body = json!({
            "size": size,
            "query": {
                "bool": {
                    "should": [
                        {
                            "multi_match": {
                                "query": query,
                                "fields": ["fileName^3", "content^2", "ocrText"],
                                "boost": text_weight
                            }
                        },
                        {
                            "knn": {
                                "imageVector": {"vector": vector, "k": size, "boost": vector_weight}
                            }
                        }
                    ]
                }
            }
        });
        self.run_search(body).await
    }

    fn scroll(&self, query: Value, page_size: u32) -> BoxStream<'_, Result<SearchHit, IndexError>> {
        let endpoint = self.endpoint.clone();
        let index = self.index.clone();
        let client = self.client.clone();

        let state = ScrollState {
            client,
            endpoint,
            index,
            query,
            page_size,
            scroll_id: None,
            buffer: Vec::new(),
            exhausted: false,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(hit) = state.buffer.pop() {
                    return Some((Ok(hit), state));
                }
                if state.exhausted {
                    return None;
                }
                match state.fetch_next_page().await {
                    Ok(true) => continue,
                    Ok(false) => {
                        state.exhausted = true;
                        continue;
                    }
                    Err(e) => {
                        state.exhausted = true;
                        return Some((Err(e), state));
                    }
                }
            }
        })
        .boxed()
    }

    async fn count_by_query(&self, query: &Value) -> Result<u64, IndexError> {
        let resp = self
            .client
            .post(self.url("/_count"))
            .json(&json!({"query": query}))
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        let body = Self::parse_response(resp).await?;
        Ok(body["count"].as_u64().unwrap_or(0))
    }

    async fn refresh(&self) -> Result<(), IndexError> {
        self.client
            .post(self.url("/_refresh"))
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        Ok(())
    }
}

impl OpenSearchIndexGateway {
    async fn run_search(&self, body: Value) -> Result<SearchResults, IndexError> {
        let resp = self
            .client
            .post(self.url("/_search"))
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        let parsed = Self::parse_response(resp).await?;

        let total = parsed["hits"]["total"]["value"].as_u64().unwrap_or(0);
        let hits = parsed["hits"]["hits"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|h| SearchHit {
                id: h["_id"].as_str().unwrap_or_default().to_string(),
                score: h["_score"].as_f64().unwrap_or(0.0) as f32,
                source: h["_source"].clone(),
                highlight: h.get("highlight").cloned(),
            })
            .collect();

        Ok(SearchResults { total, hits })
    }
}

struct ScrollState {
    client: reqwest::Client,
    endpoint: String,
    index: String,
    query: Value,
    page_size: u32,
    scroll_id: Option<String>,
    buffer: Vec<SearchHit>,
    exhausted: bool,
}

impl ScrollState {
    async fn fetch_next_page(&mut self) -> Result<bool, IndexError> {
        let resp = match &self.scroll_id {
            None => {
                let url = format!("{}/{}/_search?scroll=5m", self.endpoint, self.index);
                self.client
                    .post(url)
                    .json(&json!({"size": self.page_size, "query": self.query}))
                    .send()
                    .await
            }
            Some(id) => {
                let url = format!("{}/_search/scroll", self.endpoint);
                self.client
                    .post(url)
                    .json(&json!({"scroll": "5m", "scroll_id": id}))
                    .send()
                    .await
            }
        }
        .map_err(|e| IndexError::Connection(e.to_string()))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| IndexError::ClusterError(e.to_string()))?;
        if !status.is_success() {
            return Err(IndexError::ClusterError(format!("{status}: {body}")));
        }

        self.scroll_id = body["_scroll_id"].as_str().map(str::to_string);

        let hits: Vec<Value> = body["hits"]["hits"].as_array().cloned().unwrap_or_default();
        if hits.is_empty() {
            return Ok(false);
        }

        for h in hits {
            self.buffer.push(SearchHit {
                id: h["_id"].as_str().unwrap_or_default().to_string(),
                score: h["_score"].as_f64().unwrap_or(0.0) as f32,
                source: h["_source"].clone(),
                highlight: h.get("highlight").cloned(),
            });
        }
        Ok(true)
    }
}

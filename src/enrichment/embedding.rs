//! Multimodal embedding generation via a remote HTTP function.
//!
//! The "remote function" contract in the governing design is HTTP-shaped
//! (a Lambda-style URL taking `{imageUrl, useCache}`), so a plain
//! `reqwest::Client` wrapper is the right shape here — no AWS Lambda SDK
//! is needed for a request/response contract this thin.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    #[serde(rename = "imageUrl")]
    image_url: &'a str,
    #[serde(rename = "useCache")]
    use_cache: bool,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
    dimension: usize,
    #[allow(dead_code)]
    cached: bool,
    #[allow(dead_code)]
    #[serde(rename = "inferenceTime")]
    inference_time: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
    pub dimension: usize,
}

pub struct EmbeddingClient {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl EmbeddingClient {
    pub fn new(endpoint: Option<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build embedding HTTP client");
        Self { client, endpoint }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Generate an embedding for an object URL. Any failure (no endpoint
    /// configured, network error, dimension mismatch) is swallowed and
    /// logged per the log-and-continue rule for enrichment producers — the
    /// document is still indexed without the missing artifact.
    pub async fn generate(&self, image_url: &str, expected_dimension: Option<usize>) -> Option<EmbeddingResult> {
        let endpoint = self.endpoint.as_deref()?;

        let response = match self
            .client
            .post(endpoint)
            .json(&EmbeddingRequest {
                image_url,
                use_cache: true,
            })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, image_url, "embedding request failed, proceeding without embedding");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), image_url, "embedding endpoint returned an error status");
            return None;
        }

        let parsed: EmbeddingResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to decode embedding response");
                return None;
            }
        };

        if parsed.embedding.len() != parsed.dimension {
            warn!(
                declared = parsed.dimension,
                actual = parsed.embedding.len(),
                "embedding response dimension mismatch, discarding"
            );
            return None;
        }
        if let Some(expected) = expected_dimension {
            if parsed.dimension != expected {
                warn!(expected, got = parsed.dimension, "embedding dimension does not match index mapping");
                return None;
            }
        }

        Some(EmbeddingResult {
            vector: parsed.embedding,
            dimension: parsed.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_client_returns_none() {
        let client = EmbeddingClient::new(None, std::time::Duration::from_secs(1));
        assert!(!client.is_configured());
        assert!(client.generate("s3://bucket/a.jpg", None).await.is_none());
    }
}

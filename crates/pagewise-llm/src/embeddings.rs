//! Dense and sparse embedding clients.

use crate::error::{LlmError, LlmResult};
use crate::traits::{DenseEmbedder, SparseEmbedder};
use crate::types::*;
use async_trait::async_trait;
use pagewise_config::{EmbeddingConfig, SparseConfig};
use pagewise_core::SparseVector;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct DenseEmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl DenseEmbeddingClient {
    /// Create a new client from configuration.
    pub fn from_config(config: &EmbeddingConfig) -> LlmResult<Self> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            timeout,
        })
    }
}

#[async_trait]
impl DenseEmbedder for DenseEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        debug!("Embedding {} texts with model {}", texts.len(), self.model);

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::from_send(e, &self.base_url, self.timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(LlmError::CountMismatch {
                expected: texts.len(),
                actual: parsed.data.len(),
            });
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

/// Client for the sparse embedding service (`POST {base_url}/sparse_embed`).
///
/// The HTTP timeout is the per-attempt timeout; retries are left to the caller.
#[derive(Clone)]
pub struct SparseEmbeddingClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl SparseEmbeddingClient {
    /// Create a new client from configuration.
    pub fn from_config(config: &SparseConfig) -> LlmResult<Self> {
        let timeout = config.attempt_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl SparseEmbedder for SparseEmbeddingClient {
    async fn sparse_embed(&self, texts: &[String]) -> LlmResult<Vec<SparseVector>> {
        let url = format!("{}/sparse_embed", self.base_url);
        debug!("Sparse embedding {} texts", texts.len());

        let response = self
            .client
            .post(&url)
            .json(&SparseEmbedRequest { text: texts })
            .send()
            .await
            .map_err(|e| LlmError::from_send(e, &self.base_url, self.timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        let vectors: Vec<SparseVector> = response.json().await?;
        if vectors.len() != texts.len() {
            return Err(LlmError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_client_creation() {
        let client = DenseEmbeddingClient::from_config(&EmbeddingConfig::default()).unwrap();
        assert_eq!(client.model, "bge-m3");
        assert!(client.api_key.is_none());
    }

    #[test]
    fn test_sparse_client_uses_attempt_timeout() {
        let config = SparseConfig {
            base_url: "http://localhost:8002/".to_string(),
            ..SparseConfig::default()
        };
        let client = SparseEmbeddingClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8002");
        assert_eq!(client.timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_dense_empty_input_skips_backend() {
        let config = EmbeddingConfig {
            // Nothing listens here; an actual request would fail.
            base_url: "http://127.0.0.1:9".to_string(),
            ..EmbeddingConfig::default()
        };
        let client = DenseEmbeddingClient::from_config(&config).unwrap();
        let vectors = client.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_sparse_request_body() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let body = serde_json::to_value(SparseEmbedRequest { text: &texts }).unwrap();
        assert_eq!(body, serde_json::json!({"text": ["a", "b"]}));
    }
}

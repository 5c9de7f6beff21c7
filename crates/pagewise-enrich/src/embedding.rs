//! Dense and sparse embeddings for contextualized pages.

use crate::error::{EnrichError, EnrichResult, Stage};
use crate::gate;
use crate::normalize::strip_table_markup;
use pagewise_config::SparseConfig;
use pagewise_core::SparseVector;
use pagewise_llm::{DenseEmbedder, LlmError, SparseEmbedder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Retry settings for the sparse embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SparseConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SparseConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    /// Backoff after the given failed attempt (1-based): the base delay doubled
    /// for every earlier failure.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(doublings)
    }
}

/// Scale a vector to unit length. A zero vector is returned unchanged.
pub fn normalize_embedding(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 {
        return vector;
    }
    for x in vector.iter_mut() {
        *x = (f64::from(*x) / norm) as f32;
    }
    vector
}

/// Embeddings of one document, one entry per page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEmbeddings {
    pub dense: Vec<Vec<f32>>,
    pub sparse: Vec<SparseVector>,
}

/// Runs both embedding backends over a document's contextualized pages.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEmbedder>,
    retry: RetryPolicy,
}

impl EmbeddingGenerator {
    pub fn new(dense: Arc<dyn DenseEmbedder>, sparse: Arc<dyn SparseEmbedder>) -> Self {
        Self {
            dense,
            sparse,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Embed every page. Table markup is stripped first; both backends run
    /// concurrently, each holding one gate slot.
    pub async fn generate(
        &self,
        pages: &[String],
        gate: &Semaphore,
    ) -> EnrichResult<PageEmbeddings> {
        let texts: Vec<String> = pages.iter().map(|page| strip_table_markup(page)).collect();

        let (dense, sparse) = tokio::try_join!(
            self.embed_dense(&texts, gate),
            self.embed_sparse(&texts, gate)
        )?;

        Ok(PageEmbeddings { dense, sparse })
    }

    /// Dense vectors, unit-normalized.
    pub async fn embed_dense(
        &self,
        texts: &[String],
        gate: &Semaphore,
    ) -> EnrichResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = {
            let _permit = gate::enter(gate).await?;
            self.dense
                .embed(texts)
                .await
                .map_err(EnrichError::model(Stage::DenseEmbedding))?
        };
        check_count(Stage::DenseEmbedding, texts.len(), vectors.len())?;

        debug!("Dense embedded {} pages", vectors.len());
        Ok(vectors.into_iter().map(normalize_embedding).collect())
    }

    /// Sparse vectors, retrying transient failures with exponential backoff.
    pub async fn embed_sparse(
        &self,
        texts: &[String],
        gate: &Semaphore,
    ) -> EnrichResult<Vec<SparseVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 1;
        loop {
            let result = {
                let _permit = gate::enter(gate).await?;
                let call = self.sparse.sparse_embed(texts);
                tokio::time::timeout(self.retry.attempt_timeout, call).await
            };

            let error = match result {
                Ok(Ok(vectors)) => {
                    check_count(Stage::SparseEmbedding, texts.len(), vectors.len())?;
                    debug!("Sparse embedded {} pages (attempt {})", vectors.len(), attempt);
                    return Ok(vectors);
                }
                Ok(Err(e)) => e,
                Err(_) => LlmError::Timeout {
                    seconds: self.retry.attempt_timeout.as_secs(),
                },
            };

            if !error.is_transient() || attempt >= self.retry.max_attempts {
                return Err(EnrichError::Model {
                    stage: Stage::SparseEmbedding,
                    source: error,
                });
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                "Sparse embedding attempt {}/{} failed, retrying in {:?}: {}",
                attempt, self.retry.max_attempts, delay, error
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn check_count(stage: Stage, expected: usize, actual: usize) -> EnrichResult<()> {
    if expected != actual {
        return Err(EnrichError::Model {
            stage,
            source: LlmError::CountMismatch { expected, actual },
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedDense, FlakySparse};

    fn retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(5),
            attempt_timeout: Duration::from_millis(200),
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("<td>text {}</td>", i)).collect()
    }

    #[test]
    fn test_normalize_to_unit_length() {
        let v = normalize_embedding(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let v = normalize_embedding(vec![0.1, -2.5, 7.0, 0.003]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_unchanged() {
        assert_eq!(normalize_embedding(vec![0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
        assert!(normalize_embedding(vec![]).is_empty());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
        assert_eq!(RetryPolicy::default(), policy);
    }

    #[tokio::test]
    async fn test_generate_strips_markup_and_normalizes() {
        let dense = FixedDense::new(vec![3.0, 4.0]);
        let sparse = FlakySparse::new(0);
        let generator = EmbeddingGenerator::new(dense.clone(), sparse.clone()).with_retry(retry(3));
        let gate = Semaphore::new(2);

        let embeddings = generator.generate(&texts(3), &gate).await.unwrap();
        assert_eq!(embeddings.dense.len(), 3);
        assert_eq!(embeddings.sparse.len(), 3);
        assert!((embeddings.dense[0][0] - 0.6).abs() < 1e-6);
        assert!(dense.seen().iter().all(|t| !t.contains("<td>")));
        assert_eq!(sparse.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_skips_backends() {
        let dense = FixedDense::new(vec![1.0]);
        let sparse = FlakySparse::new(0);
        let generator = EmbeddingGenerator::new(dense.clone(), sparse.clone());
        let gate = Semaphore::new(1);

        let embeddings = generator.generate(&[], &gate).await.unwrap();
        assert!(embeddings.dense.is_empty());
        assert!(embeddings.sparse.is_empty());
        assert_eq!(dense.calls(), 0);
        assert_eq!(sparse.calls(), 0);
    }

    #[tokio::test]
    async fn test_sparse_retries_transient_errors() {
        let sparse = FlakySparse::new(2);
        let generator =
            EmbeddingGenerator::new(FixedDense::new(vec![1.0]), sparse.clone()).with_retry(retry(3));
        let gate = Semaphore::new(1);

        let vectors = generator.embed_sparse(&texts(2), &gate).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(sparse.calls(), 3);
    }

    #[tokio::test]
    async fn test_sparse_gives_up_after_max_attempts() {
        let sparse = FlakySparse::new(5);
        let generator =
            EmbeddingGenerator::new(FixedDense::new(vec![1.0]), sparse.clone()).with_retry(retry(3));
        let gate = Semaphore::new(1);

        let err = generator.embed_sparse(&texts(2), &gate).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::SparseEmbedding));
        assert_eq!(sparse.calls(), 3);
    }

    #[tokio::test]
    async fn test_sparse_does_not_retry_api_errors() {
        let sparse = FlakySparse::rejecting();
        let generator =
            EmbeddingGenerator::new(FixedDense::new(vec![1.0]), sparse.clone()).with_retry(retry(3));
        let gate = Semaphore::new(1);

        assert!(generator.embed_sparse(&texts(1), &gate).await.is_err());
        assert_eq!(sparse.calls(), 1);
    }

    #[tokio::test]
    async fn test_sparse_attempt_timeout_is_retried() {
        let sparse = FlakySparse::hanging(1);
        let generator =
            EmbeddingGenerator::new(FixedDense::new(vec![1.0]), sparse.clone()).with_retry(retry(3));
        let gate = Semaphore::new(1);

        let vectors = generator.embed_sparse(&texts(1), &gate).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(sparse.calls(), 2);
    }

    #[tokio::test]
    async fn test_dense_count_mismatch_fails() {
        let dense = FixedDense::short(vec![1.0]);
        let generator = EmbeddingGenerator::new(dense, FlakySparse::new(0));
        let gate = Semaphore::new(1);

        let err = generator.embed_dense(&texts(3), &gate).await.unwrap_err();
        assert!(matches!(
            err,
            EnrichError::Model {
                stage: Stage::DenseEmbedding,
                source: LlmError::CountMismatch { expected: 3, actual: 2 },
            }
        ));
    }
}

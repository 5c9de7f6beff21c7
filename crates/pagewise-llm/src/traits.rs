//! Backend traits the enrichment pipeline is written against.

use crate::error::LlmResult;
use crate::types::ChatPrompt;
use async_trait::async_trait;
use pagewise_core::SparseVector;

/// A chat-completion backend returning free text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run one completion and return the response text.
    async fn complete(&self, prompt: &ChatPrompt) -> LlmResult<String>;
}

/// A dense embedding backend. Returns one vector per input, in input order.
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>>;
}

/// A sparse embedding backend. Returns one vector per input, in input order.
#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    async fn sparse_embed(&self, texts: &[String]) -> LlmResult<Vec<SparseVector>>;
}

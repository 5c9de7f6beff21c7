//! Pagewise LLM - Clients for the chat-completion, dense-embedding and
//! sparse-embedding backends used by the enrichment pipeline.
//!
//! Every backend sits behind a trait ([`ChatModel`], [`DenseEmbedder`],
//! [`SparseEmbedder`]) so the pipeline can run against mocks in tests.

mod client;
mod embeddings;
mod error;
mod failover;
mod traits;
mod types;

pub use client::ChatClient;
pub use embeddings::{DenseEmbeddingClient, SparseEmbeddingClient};
pub use error::{LlmError, LlmResult};
pub use failover::FailoverChat;
pub use traits::{ChatModel, DenseEmbedder, SparseEmbedder};
pub use types::*;

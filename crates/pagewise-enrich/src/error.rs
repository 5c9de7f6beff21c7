//! Error types for the enrichment pipeline.

use pagewise_llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for enrichment operations.
pub type EnrichResult<T> = Result<T, EnrichError>;

/// Pipeline step a document error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    Summary,
    Context,
    DenseEmbedding,
    SparseEmbedding,
    Assembly,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::Summary => "summary",
            Stage::Context => "context",
            Stage::DenseEmbedding => "dense_embedding",
            Stage::SparseEmbedding => "sparse_embedding",
            Stage::Assembly => "assembly",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during enrichment.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] pagewise_config::ConfigError),

    #[error("Backend setup failed: {0}")]
    Backend(LlmError),

    #[error("{stage} call failed: {source}")]
    Model {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("Malformed {stage} output: {message}")]
    MalformedOutput { stage: Stage, message: String },

    #[error(transparent)]
    Document(#[from] pagewise_core::Error),

    #[error("Failed to read {path}: {message}")]
    Input { path: PathBuf, message: String },

    #[error("Failed to write checkpoint {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    #[error("Concurrency gate closed")]
    GateClosed,
}

impl EnrichError {
    /// Pipeline step the error belongs to, if it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EnrichError::Model { stage, .. } | EnrichError::MalformedOutput { stage, .. } => {
                Some(*stage)
            }
            EnrichError::Document(_) => Some(Stage::Assembly),
            _ => None,
        }
    }

    pub(crate) fn model(stage: Stage) -> impl FnOnce(LlmError) -> EnrichError {
        move |source| EnrichError::Model { stage, source }
    }
}

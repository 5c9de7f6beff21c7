//! Pagewise Enrich - Turns per-page OCR text into page-level retrieval records.
//!
//! This crate provides:
//! - Text normalization and language detection
//! - Metadata extraction and per-page context synthesis with a language model
//! - Dense and sparse embedding generation
//! - The per-document pipeline and a checkpointed batch scheduler
//! - Utilities around the OCR input: file-name mapping, statistics, diffing, export

pub mod checkpoint;
pub mod context;
pub mod diff;
pub mod embedding;
mod error;
pub mod export;
mod gate;
pub mod input;
pub mod lang;
pub mod mapping;
pub mod metadata;
pub mod normalize;
pub mod pipeline;
pub mod repair;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use checkpoint::CheckpointStore;
pub use embedding::{EmbeddingGenerator, RetryPolicy};
pub use error::{EnrichError, EnrichResult, Stage};
pub use input::{DocumentSet, OcrStats};
pub use pipeline::{DocumentPipeline, DocumentProcessor};
pub use scheduler::{BatchReport, BatchScheduler, RunSummary, SchedulerObserver, SchedulerOptions};

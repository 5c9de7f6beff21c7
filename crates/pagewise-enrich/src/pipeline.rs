//! Per-document pipeline: normalize, enrich, embed, assemble.

use crate::context::ContextSynthesizer;
use crate::embedding::{EmbeddingGenerator, RetryPolicy};
use crate::error::{EnrichError, EnrichResult};
use crate::metadata::MetadataExtractor;
use crate::normalize::normalize_page;
use async_trait::async_trait;
use pagewise_config::Config;
use pagewise_core::{DocumentRecord, DocumentUnit};
use pagewise_llm::{
    ChatModel, DenseEmbedder, DenseEmbeddingClient, FailoverChat, SparseEmbedder,
    SparseEmbeddingClient,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Turns one document into its retrieval record.
#[async_trait]
pub trait DocumentProcessor: Send + Sync + 'static {
    async fn process(&self, document: DocumentUnit) -> EnrichResult<DocumentRecord>;
}

/// The enrichment pipeline over chat, dense and sparse backends.
#[derive(Clone)]
pub struct DocumentPipeline {
    metadata: MetadataExtractor,
    context: ContextSynthesizer,
    embeddings: EmbeddingGenerator,
    intra_document_concurrency: usize,
}

impl DocumentPipeline {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        dense: Arc<dyn DenseEmbedder>,
        sparse: Arc<dyn SparseEmbedder>,
    ) -> Self {
        Self {
            metadata: MetadataExtractor::new(chat.clone()),
            context: ContextSynthesizer::new(chat),
            embeddings: EmbeddingGenerator::new(dense, sparse),
            intra_document_concurrency: 24,
        }
    }

    /// Build the pipeline with HTTP backends from configuration.
    pub fn from_config(config: &Config) -> EnrichResult<Self> {
        config.validate()?;
        let chat = FailoverChat::from_config(&config.llm).map_err(EnrichError::Backend)?;
        let dense =
            DenseEmbeddingClient::from_config(&config.embedding).map_err(EnrichError::Backend)?;
        let sparse =
            SparseEmbeddingClient::from_config(&config.sparse).map_err(EnrichError::Backend)?;

        debug!("Pipeline uses {} chat endpoint(s)", chat.len());

        Ok(Self::new(Arc::new(chat), Arc::new(dense), Arc::new(sparse))
            .with_retry(RetryPolicy::from_config(&config.sparse))
            .with_concurrency(config.pipeline.intra_document_concurrency))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.embeddings = self.embeddings.with_retry(retry);
        self
    }

    /// Width of the per-document gate.
    pub fn with_concurrency(mut self, width: usize) -> Self {
        self.intra_document_concurrency = width.max(1);
        self
    }

    /// Run every stage for one document.
    pub async fn run(&self, document: &DocumentUnit) -> EnrichResult<DocumentRecord> {
        document.ensure_not_empty()?;
        let started = Instant::now();
        let gate = Semaphore::new(self.intra_document_concurrency);

        let pages: Vec<String> = document.pages.iter().map(|page| normalize_page(page)).collect();

        let (metadata, contextualized) = tokio::try_join!(
            self.metadata.extract(&document.file_name, &pages[0], &gate),
            self.context.synthesize(&document.file_name, &pages, &gate),
        )?;

        let embeddings = self.embeddings.generate(&contextualized.pages, &gate).await?;

        let record = DocumentRecord {
            file_name: document.file_name.clone(),
            metadata,
            contextualized_pages: contextualized.pages,
            dense_embeddings: embeddings.dense,
            sparse_embeddings: embeddings.sparse,
        };
        record.validate(document.page_count())?;

        info!(
            "Processed {} ({} pages) in {:.1}s",
            document.file_name,
            document.page_count(),
            started.elapsed().as_secs_f64()
        );
        Ok(record)
    }
}

#[async_trait]
impl DocumentProcessor for DocumentPipeline {
    async fn process(&self, document: DocumentUnit) -> EnrichResult<DocumentRecord> {
        self.run(&document).await.map_err(|e| {
            let stage = e.stage().map(|s| s.as_str()).unwrap_or("pipeline");
            warn!("{} failed at {}: {}", document.file_name, stage, e);
            e
        })
    }
}

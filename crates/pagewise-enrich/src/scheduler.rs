//! Checkpointed batch scheduling over a bounded worker pool.
//!
//! The sorted document set is cut into fixed-size numbered batches. A batch
//! whose file already exists is skipped, so an interrupted run resumes at the
//! first unfinished batch. Within a batch every document runs as its own task
//! under a hard timeout; failures and timeouts are dropped from the output
//! without disturbing the rest of the batch.

use crate::checkpoint::CheckpointStore;
use crate::error::{EnrichError, EnrichResult};
use crate::input::DocumentSet;
use crate::pipeline::DocumentProcessor;
use chrono::{DateTime, Utc};
use pagewise_config::PipelineConfig;
use pagewise_core::{DocumentHash, DocumentOutcome, DocumentRecord, DocumentUnit, OutcomeKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Attempts a document gets when it keeps timing out.
pub const TIMEOUT_ATTEMPTS: u32 = 2;

/// Batch scheduling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub batch_size: usize,
    pub max_workers: usize,
    pub per_document_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl SchedulerOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.checkpoint_batch_size.max(1),
            max_workers: config.effective_workers(),
            per_document_timeout: config.per_document_timeout(),
        }
    }
}

/// Progress callbacks. Every method defaults to doing nothing.
pub trait SchedulerObserver: Send + Sync {
    fn run_started(&self, _documents: usize, _batches: usize) {}
    fn batch_started(&self, _index: usize, _documents: usize) {}
    fn document_finished(&self, _file_name: &str, _kind: OutcomeKind) {}
    fn batch_finished(&self, _report: &BatchReport) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl SchedulerObserver for NoopObserver {}

/// What happened to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Processed and written in this run.
    Written,
    /// File existed already; nothing was processed.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub index: usize,
    pub path: PathBuf,
    pub status: BatchStatus,
    pub documents: usize,
    pub succeeded: usize,
    /// File names of failed documents.
    pub failed: Vec<String>,
    /// File names of documents that timed out twice.
    pub timed_out: Vec<String>,
}

impl BatchReport {
    fn new(index: usize, path: PathBuf, status: BatchStatus, documents: usize) -> Self {
        Self {
            index,
            path,
            status,
            documents,
            succeeded: 0,
            failed: Vec::new(),
            timed_out: Vec::new(),
        }
    }
}

/// Totals of a scheduler run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub batches: Vec<BatchReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.batches.iter().map(|b| b.succeeded).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &String> {
        self.batches.iter().flat_map(|b| b.failed.iter())
    }

    pub fn timed_out(&self) -> impl Iterator<Item = &String> {
        self.batches.iter().flat_map(|b| b.timed_out.iter())
    }

    pub fn batches_written(&self) -> usize {
        self.batches.iter().filter(|b| b.status == BatchStatus::Written).count()
    }

    pub fn batches_skipped(&self) -> usize {
        self.batches.iter().filter(|b| b.status == BatchStatus::Skipped).count()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Runs a [`DocumentProcessor`] over a document set, one checkpoint file per batch.
pub struct BatchScheduler<P: DocumentProcessor> {
    processor: Arc<P>,
    store: CheckpointStore,
    options: SchedulerOptions,
    observer: Arc<dyn SchedulerObserver>,
}

impl<P: DocumentProcessor> BatchScheduler<P> {
    pub fn new(processor: Arc<P>, store: CheckpointStore, options: SchedulerOptions) -> Self {
        Self {
            processor,
            store,
            options,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SchedulerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Sorted hashes cut into batches of `batch_size`.
    pub fn plan(&self, documents: &DocumentSet) -> Vec<Vec<DocumentHash>> {
        let hashes: Vec<DocumentHash> = documents.hashes().cloned().collect();
        hashes
            .chunks(self.options.batch_size.max(1))
            .map(<[DocumentHash]>::to_vec)
            .collect()
    }

    /// Process every batch that has no file yet.
    pub async fn run(&self, documents: &DocumentSet) -> EnrichResult<RunSummary> {
        let started_at = Utc::now();
        self.store.ensure_dir()?;

        let plan = self.plan(documents);
        self.observer.run_started(documents.len(), plan.len());
        info!(
            "Scheduling {} documents in {} batches ({} workers)",
            documents.len(),
            plan.len(),
            self.options.max_workers
        );

        let mut batches = Vec::with_capacity(plan.len());
        for (index, hashes) in plan.iter().enumerate() {
            let report = if self.store.is_persisted(index) {
                info!("Batch {} already persisted, skipping", index);
                BatchReport::new(
                    index,
                    self.store.batch_path(index),
                    BatchStatus::Skipped,
                    hashes.len(),
                )
            } else {
                self.run_batch(index, hashes, documents).await?
            };
            self.observer.batch_finished(&report);
            batches.push(report);
        }

        Ok(RunSummary {
            started_at,
            finished_at: Utc::now(),
            batches,
        })
    }

    async fn run_batch(
        &self,
        index: usize,
        hashes: &[DocumentHash],
        documents: &DocumentSet,
    ) -> EnrichResult<BatchReport> {
        self.observer.batch_started(index, hashes.len());
        info!("Batch {}: processing {} documents", index, hashes.len());

        let workers = Arc::new(Semaphore::new(self.options.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for hash in hashes {
            let Some(document) = documents.get(hash) else {
                continue;
            };
            let permit = Arc::clone(&workers)
                .acquire_owned()
                .await
                .map_err(|_| EnrichError::GateClosed)?;
            let processor = Arc::clone(&self.processor);
            let document = document.clone();
            let timeout = self.options.per_document_timeout;

            tasks.spawn(async move {
                let _permit = permit;
                let hash = document.hash.clone();
                let file_name = document.file_name.clone();
                let outcome = run_document(processor, document, timeout).await;
                (hash, file_name, outcome)
            });
        }

        let mut report = BatchReport::new(
            index,
            self.store.batch_path(index),
            BatchStatus::Written,
            hashes.len(),
        );
        let mut records: Vec<(DocumentHash, DocumentRecord)> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (hash, file_name, outcome) = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    error!("Batch {} worker task died: {}", index, e);
                    report.failed.push(format!("<unknown: {}>", e));
                    continue;
                }
            };

            self.observer.document_finished(&file_name, outcome.kind());
            match outcome {
                DocumentOutcome::Success(record) => {
                    report.succeeded += 1;
                    records.push((hash, record));
                }
                DocumentOutcome::Failure(_) => report.failed.push(file_name),
                DocumentOutcome::Timeout => report.timed_out.push(file_name),
            }
        }

        self.store.write_batch(index, &records)?;
        info!(
            "Batch {}: {} succeeded, {} failed, {} timed out",
            index,
            report.succeeded,
            report.failed.len(),
            report.timed_out.len()
        );
        Ok(report)
    }
}

/// Process one document in its own task under a hard timeout. A timed-out
/// task is aborted and the document tried once more; a panic counts as a
/// failure.
pub async fn run_document<P: DocumentProcessor + ?Sized>(
    processor: Arc<P>,
    document: DocumentUnit,
    timeout: Duration,
) -> DocumentOutcome {
    for attempt in 1..=TIMEOUT_ATTEMPTS {
        let task_processor = Arc::clone(&processor);
        let task_document = document.clone();
        let mut handle =
            tokio::spawn(async move { task_processor.process(task_document).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(record))) => return DocumentOutcome::Success(record),
            Ok(Ok(Err(e))) => return DocumentOutcome::Failure(e.to_string()),
            Ok(Err(e)) => {
                error!("Worker for {} panicked: {}", document.file_name, e);
                return DocumentOutcome::Failure(format!("worker panicked: {}", e));
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "{} timed out after {:?} (attempt {}/{})",
                    document.file_name, timeout, attempt, TIMEOUT_ATTEMPTS
                );
            }
        }
    }

    DocumentOutcome::Timeout
}

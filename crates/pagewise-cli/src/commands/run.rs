//! Run command - enrich an OCR file batch by batch.

use super::{expand_path, load_config};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pagewise_core::OutcomeKind;
use pagewise_enrich::checkpoint::write_json_atomic;
use pagewise_enrich::input::default_mapping_path;
use pagewise_enrich::scheduler::BatchStatus;
use pagewise_enrich::{
    BatchReport, BatchScheduler, CheckpointStore, DocumentPipeline, DocumentSet, RunSummary,
    SchedulerObserver, SchedulerOptions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Names listed per category in the final summary.
const MAX_LISTED: usize = 20;

pub struct RunArgs {
    pub input: String,
    pub mapping: Option<String>,
    pub output: Option<String>,
    pub merged: Option<String>,
}

pub fn run(args: RunArgs, config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate().context("Invalid configuration")?;

    let input = expand_path(&args.input);
    if !input.is_file() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let mapping = args
        .mapping
        .map(|m| expand_path(&m))
        .unwrap_or_else(|| default_mapping_path(&input));

    let documents = DocumentSet::load(&input, &mapping).context("Failed to load documents")?;
    let store = match &args.output {
        Some(output) => CheckpointStore::for_output(&expand_path(output)),
        None => CheckpointStore::for_input(&input),
    };
    let options = SchedulerOptions::from_config(&config.pipeline);

    println!("{} {}", "Enriching:".cyan().bold(), input.display());
    println!(
        "  {} documents, {} per batch, {} workers",
        documents.len(),
        options.batch_size,
        options.max_workers
    );
    println!(
        "  Checkpoints: {}",
        store.dir().join(format!("{}_NNNN.json", store.stem())).display()
    );
    if !documents.unmapped().is_empty() {
        println!(
            "  {} {} documents have no mapping entry and are skipped",
            "Note:".yellow(),
            documents.unmapped().len()
        );
    }

    let pipeline = DocumentPipeline::from_config(&config).context("Failed to set up backends")?;
    let progress = Arc::new(RunProgress::new());
    let scheduler = BatchScheduler::new(Arc::new(pipeline), store, options)
        .with_observer(progress.clone());

    let rt = Runtime::new().context("Failed to create async runtime")?;
    let summary = rt.block_on(scheduler.run(&documents));
    progress.finish();
    let summary = summary.context("Run aborted")?;

    print_summary(&summary, documents.unmapped());

    if let Some(merged) = args.merged {
        let merged = expand_path(&merged);
        let records = scheduler
            .store()
            .merge_all()
            .context("Failed to merge batches")?;
        write_json_atomic(&merged, &records).context("Failed to write merged output")?;
        println!(
            "{} Merged {} records into {}",
            "✓".green(),
            records.len(),
            merged.display()
        );
    }

    Ok(())
}

/// Progress bar over all documents of the run.
struct RunProgress {
    bar: ProgressBar,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    timed_out: AtomicUsize,
}

impl RunProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);

        Self {
            bar,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            timed_out: AtomicUsize::new(0),
        }
    }

    fn refresh_message(&self) {
        self.bar.set_message(format!(
            "ok {} / failed {} / timeout {}",
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.timed_out.load(Ordering::Relaxed)
        ));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SchedulerObserver for RunProgress {
    fn run_started(&self, documents: usize, _batches: usize) {
        self.bar.set_length(documents as u64);
    }

    fn batch_started(&self, index: usize, documents: usize) {
        self.bar
            .println(format!("{} batch {} ({} documents)", "→".cyan(), index, documents));
    }

    fn document_finished(&self, _file_name: &str, kind: OutcomeKind) {
        let counter = match kind {
            OutcomeKind::Success => &self.succeeded,
            OutcomeKind::Failure => &self.failed,
            OutcomeKind::Timeout => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
        self.refresh_message();
    }

    fn batch_finished(&self, report: &BatchReport) {
        match report.status {
            BatchStatus::Skipped => {
                self.bar.inc(report.documents as u64);
                self.bar.println(format!(
                    "{} batch {} already done: {}",
                    "↷".yellow(),
                    report.index,
                    report.path.display()
                ));
            }
            BatchStatus::Written => {
                self.bar.println(format!(
                    "{} batch {}: {} ok, {} failed, {} timed out -> {}",
                    "✓".green(),
                    report.index,
                    report.succeeded,
                    report.failed.len(),
                    report.timed_out.len(),
                    report.path.display()
                ));
            }
        }
    }
}

fn print_summary(summary: &RunSummary, unmapped: &[String]) {
    let failed: Vec<&String> = summary.failed().collect();
    let timed_out: Vec<&String> = summary.timed_out().collect();

    println!();
    println!("{}", "Run Summary".cyan().bold());
    println!("{}", "─".repeat(50));
    println!(
        "  Batches: {} written, {} skipped",
        summary.batches_written(),
        summary.batches_skipped()
    );
    println!("  Succeeded: {}", summary.succeeded().to_string().green());
    println!("  Failed: {}", colored_count(failed.len()));
    println!("  Timed out: {}", colored_count(timed_out.len()));
    println!("  Unmapped: {}", colored_count(unmapped.len()));
    println!("  Elapsed: {}s", summary.elapsed().num_seconds());

    list("Failed", &failed);
    list("Timed out", &timed_out);
    list("Unmapped", &unmapped.iter().collect::<Vec<_>>());
}

fn colored_count(count: usize) -> String {
    if count == 0 {
        count.to_string()
    } else {
        count.to_string().red().to_string()
    }
}

fn list(label: &str, names: &[&String]) {
    if names.is_empty() {
        return;
    }
    println!();
    println!("{}", label.white().bold());
    for name in names.iter().take(MAX_LISTED) {
        println!("  - {}", name);
    }
    if names.len() > MAX_LISTED {
        println!("  ... and {} more", names.len() - MAX_LISTED);
    }
}

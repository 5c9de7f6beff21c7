//! Export command - flatten result files for a vector-store loader.

use super::expand_path;
use anyhow::{Context, Result};
use colored::Colorize;
use pagewise_enrich::export::{collect_dir, rows, write_jsonl};

pub fn run(dir: &str, output: Option<String>) -> Result<()> {
    let dir = expand_path(dir);
    let output = output
        .map(|o| expand_path(&o))
        .unwrap_or_else(|| dir.join("vectors.jsonl"));

    let records = collect_dir(&dir).context("Failed to read result files")?;
    if records.is_empty() {
        println!("{} No records found in {}", "Note:".yellow(), dir.display());
        return Ok(());
    }

    let rows = rows(&records);
    let written = write_jsonl(&rows, &output).context("Failed to write export")?;

    println!(
        "{} Exported {} pages from {} documents to {}",
        "✓".green(),
        written.to_string().green(),
        records.len(),
        output.display()
    );

    Ok(())
}

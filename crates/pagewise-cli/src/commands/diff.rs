//! Diff command - keep only entries missing from a reference file.

use super::expand_path;
use anyhow::{Context, Result};
use colored::Colorize;
use pagewise_enrich::diff::diff_files;

pub fn run(reference: &str, new: &str, output: &str) -> Result<()> {
    let output = expand_path(output);
    let added = diff_files(&expand_path(reference), &expand_path(new), &output)
        .context("Failed to diff files")?;

    println!(
        "{} {} new entries written to {}",
        "✓".green(),
        added.to_string().green(),
        output.display()
    );

    Ok(())
}

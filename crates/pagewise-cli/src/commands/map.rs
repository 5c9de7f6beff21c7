//! Map command - hash PDFs and write the file-name mapping.

use super::expand_path;
use anyhow::{Context, Result};
use colored::Colorize;
use pagewise_enrich::checkpoint::write_json_atomic;
use pagewise_enrich::input::MAPPING_FILE_NAME;
use pagewise_enrich::mapping::build_mapping;

pub fn run(dir: &str, output: Option<String>) -> Result<()> {
    let dir = expand_path(dir);
    let output = output
        .map(|o| expand_path(&o))
        .unwrap_or_else(|| dir.join(MAPPING_FILE_NAME));

    println!("{} {}", "Scanning:".cyan().bold(), dir.display());
    let mapping = build_mapping(&dir).context("Failed to build mapping")?;

    if mapping.is_empty() {
        println!("{} No PDF files found.", "Note:".yellow());
        return Ok(());
    }

    write_json_atomic(&output, &mapping).context("Failed to write mapping")?;
    println!(
        "{} Mapped {} files to {}",
        "✓".green(),
        mapping.len().to_string().green(),
        output.display()
    );

    Ok(())
}

//! Stats command - summarize an OCR file.

use super::expand_path;
use anyhow::{Context, Result};
use colored::Colorize;
use pagewise_enrich::input::{default_mapping_path, load_mapping, load_ocr_file};
use pagewise_enrich::OcrStats;

/// Keys listed before the rest is summarized as a count.
const MAX_LISTED: usize = 10;

pub fn run(input: &str, mapping: Option<String>) -> Result<()> {
    let input = expand_path(input);
    let ocr = load_ocr_file(&input).context("Failed to read OCR file")?;

    let mapping_path = mapping
        .map(|m| expand_path(&m))
        .or_else(|| Some(default_mapping_path(&input)).filter(|p| p.is_file()));
    let mapping = match &mapping_path {
        Some(path) => Some(load_mapping(path).context("Failed to read mapping")?),
        None => None,
    };

    let stats = OcrStats::collect(&ocr, mapping.as_ref());

    println!("{}", "OCR Statistics".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  File: {}", input.display());
    println!("  Documents: {}", stats.documents.to_string().green());
    println!("  Pages: {}", stats.pages);
    if stats.documents > 0 {
        println!(
            "  Pages per document: {:.1}",
            stats.pages as f64 / stats.documents as f64
        );
    }

    print_keys("Blank documents", &stats.blank_documents);

    match &mapping_path {
        Some(path) => {
            println!();
            println!("  Mapping: {}", path.display());
            print_keys("Unmapped documents", &stats.unmapped);
        }
        None => {
            println!();
            println!("{} No mapping found; coverage not checked.", "Note:".yellow());
        }
    }

    Ok(())
}

fn print_keys(label: &str, keys: &[String]) {
    if keys.is_empty() {
        println!("  {}: 0", label);
        return;
    }

    println!("  {}: {}", label, keys.len().to_string().yellow());
    for key in keys.iter().take(MAX_LISTED) {
        println!("    - {}", key);
    }
    if keys.len() > MAX_LISTED {
        println!("    ... and {} more", keys.len() - MAX_LISTED);
    }
}

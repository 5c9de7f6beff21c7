//! Configuration commands.

use super::{config_file, load_config};
use anyhow::{Context, Result};
use colored::Colorize;
use pagewise_config::Config;

pub fn init(explicit: Option<&str>, force: bool) -> Result<()> {
    let path = config_file(explicit)?;

    if path.exists() && !force {
        println!(
            "{} Config already exists: {}",
            "Note:".yellow().bold(),
            path.display()
        );
        println!("  Use {} to overwrite it.", "--force".cyan());
        return Ok(());
    }

    Config::create_default_file(&path).context("Failed to create config file")?;
    println!("{} Created config: {}", "✓".green(), path.display());
    println!();
    println!("Next steps:");
    println!("  1. Add your chat endpoints under {}", "[[llm.endpoints]]".cyan());
    println!(
        "  2. Point {} and {} at your embedding services",
        "[embedding]".cyan(),
        "[sparse]".cyan()
    );
    println!("  3. Run: {}", "pagewise run <ocr.json>".cyan());

    Ok(())
}

pub fn show(explicit: Option<&str>) -> Result<()> {
    let path = config_file(explicit)?;
    let config = load_config(explicit)?;

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    if !path.exists() {
        println!("{} No config file at {}, showing defaults.", "Note:".yellow(), path.display());
        println!();
    }
    println!("{}", config.to_toml_string().context("Failed to render config")?);

    Ok(())
}

pub fn path(explicit: Option<&str>) -> Result<()> {
    println!("{}", config_file(explicit)?.display());
    Ok(())
}

//! Pagewise CLI - Offline page enrichment for retrieval indexes

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pagewise - Turn OCR'd documents into contextualized, embedded pages
#[derive(Parser)]
#[command(name = "pagewise")]
#[command(author = "Lalo Morales <lalomorales22@github.com>")]
#[command(version)]
#[command(about = "Turn OCR'd documents into contextualized, embedded pages", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true, env = "PAGEWISE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich an OCR file, writing one checkpoint file per batch
    Run {
        /// OCR JSON file
        input: String,

        /// Hash to file-name mapping (default: mapping.json next to the input)
        #[arg(short, long)]
        mapping: Option<String>,

        /// Output path; batches are written as <stem>_NNNN.json beside it
        /// (default: <input>_processed next to the input)
        #[arg(short, long)]
        output: Option<String>,

        /// Also write every persisted batch merged into one file
        #[arg(long)]
        merged: Option<String>,
    },

    /// Build the hash to file-name mapping for a directory of PDFs
    Map {
        /// Directory to scan recursively
        dir: String,

        /// Output file (default: <dir>/mapping.json)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show statistics for an OCR file
    Stats {
        /// OCR JSON file
        input: String,

        /// Mapping to check coverage against (default: mapping.json next to the input, if present)
        #[arg(short, long)]
        mapping: Option<String>,
    },

    /// Write the entries of NEW whose keys are missing from REFERENCE
    Diff {
        /// Reference JSON file
        reference: String,

        /// New JSON file
        new: String,

        /// Output file
        output: String,
    },

    /// Flatten result files into one JSON line per page for a vector store
    Export {
        /// Directory holding result files
        dir: String,

        /// Output file (default: <dir>/vectors.jsonl)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// Print the config file location
    Path,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagewise=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagewise=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run {
            input,
            mapping,
            output,
            merged,
        } => commands::run::run(
            commands::run::RunArgs {
                input,
                mapping,
                output,
                merged,
            },
            config,
        ),
        Commands::Map { dir, output } => commands::map::run(&dir, output),
        Commands::Stats { input, mapping } => commands::stats::run(&input, mapping),
        Commands::Diff {
            reference,
            new,
            output,
        } => commands::diff::run(&reference, &new, &output),
        Commands::Export { dir, output } => commands::export::run(&dir, output),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Init { force } => commands::config::init(config, force),
            ConfigCommands::Show => commands::config::show(config),
            ConfigCommands::Path => commands::config::path(config),
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_accepts_input_and_output() {
        let cli = Cli::try_parse_from(["pagewise", "run", "ocr.json", "-o", "out/result.json"])
            .unwrap();
        match cli.command {
            Commands::Run { input, output, .. } => {
                assert_eq!(input, "ocr.json");
                assert_eq!(output.as_deref(), Some("out/result.json"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_pipeline_tuning_is_config_only() {
        for flag in ["--batch-size", "--workers", "--timeout"] {
            assert!(Cli::try_parse_from(["pagewise", "run", "ocr.json", flag, "5"]).is_err());
        }
    }
}

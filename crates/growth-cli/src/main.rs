//! Child growth classifier CLI
//!
//! A command-line tool for training the growth classifier, running single
//! and batch predictions, and inspecting or clearing the artifact cache.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cache, model, Session};
use output::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Child growth classifier CLI
#[derive(Parser)]
#[command(name = "growthctl")]
#[command(author, version, about = "CLI for the child growth classifier", long_about = None)]
pub struct Cli {
    /// Artifact cache directory (can also be set via GROWTH_CACHE_DIR env var)
    #[arg(long, env = "GROWTH_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Labeled training CSV (can also be set via GROWTH_DATASET_PATH env var)
    #[arg(long, env = "GROWTH_DATASET_PATH", global = true)]
    pub dataset: Option<PathBuf>,

    /// Neither read nor write the artifact cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from the dataset and cache it
    Train {
        /// Fit probability estimates so predictions report a confidence
        #[arg(long)]
        probability: bool,
    },

    /// Classify a single child
    Predict {
        /// Age in months (0-60)
        #[arg(long, allow_negative_numbers = true)]
        age: i64,

        /// Sex (laki-laki or perempuan)
        #[arg(long)]
        sex: String,

        /// Height in centimetres (30-200)
        #[arg(long)]
        height: f64,
    },

    /// Classify a JSON array of requests
    Batch {
        /// Input file, or "-" for stdin
        input: PathBuf,
    },

    /// Show whether the next start loads or retrains, and the cached model
    Status,

    /// Inspect or clear the artifact cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show which artifacts are cached
    Status,

    /// Remove all cached artifacts
    Clear,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let file_config = config::Config::load()?;

    let format = cli
        .format
        .or_else(|| {
            file_config
                .default_format
                .as_deref()
                .and_then(OutputFormat::from_name)
        })
        .unwrap_or_default();

    let session = Session {
        cache_dir: file_config.resolve_cache_dir(cli.cache_dir),
        dataset: file_config.resolve_dataset(cli.dataset),
        auto_cache: !cli.no_cache,
        format,
    };

    match cli.command {
        Commands::Train { probability } => model::train(&session, probability)?,
        Commands::Predict { age, sex, height } => model::predict(&session, age, &sex, height)?,
        Commands::Batch { input } => model::batch(&session, &input)?,
        Commands::Status => model::status(&session)?,
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cache::status(&session)?,
            CacheCommands::Clear => cache::clear(&session)?,
        },
    }

    Ok(())
}

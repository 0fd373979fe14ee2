//! Corpus Analysis Driver
//!
//! Feeds a preprocessed site-observation dataset through the sitelens
//! pipeline: frequency analyzers → vendor → co-occurrence → discovery →
//! validation → bias → recommendations, and emits the aggregated report as
//! JSON.
//!
//! Usage:
//!   cargo run --bin analyze -- dataset.json
//!   cargo run --bin analyze -- dataset.json --output report.json --pretty

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitelens::config::AnalysisConfig;
use sitelens::pipeline::AnalysisCoordinator;
use sitelens::types::PreprocessedDataset;

#[derive(Parser, Debug)]
#[command(
    name = "analyze",
    about = "Frequency and bias analysis over a crawled-site corpus"
)]
struct Args {
    /// Path to the preprocessed dataset JSON
    dataset: PathBuf,

    /// Optional analysis config TOML (defaults to the standard search order)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print the report JSON
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalysisConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AnalysisConfig::load(),
    };

    let raw = fs::read_to_string(&args.dataset)
        .with_context(|| format!("reading dataset from {}", args.dataset.display()))?;
    let dataset: PreprocessedDataset =
        serde_json::from_str(&raw).context("parsing dataset JSON")?;

    let report = AnalysisCoordinator::with_config(config)
        .run(&dataset)
        .context("running corpus analysis")?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{rendered}"),
    }

    Ok(())
}

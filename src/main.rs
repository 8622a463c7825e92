use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use blueprint_load::{AnalysisConfig, Analyzer, UserInputs};

/// Estimate HVAC design loads from a plan-set extraction.
#[derive(Parser, Debug)]
#[command(name = "blueprint-load", version, about)]
struct Cli {
    /// JSON dump of the extracted pages.
    extraction_json: PathBuf,

    /// ZIP code of the site, for design conditions.
    #[arg(long)]
    zip: String,

    /// What the caller knows about the house (JSON).
    #[arg(long)]
    inputs: Option<PathBuf>,

    /// Calibration overrides (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretty-print the report.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let inputs = match &cli.inputs {
        Some(path) => UserInputs::from_json_file(path)?,
        None => UserInputs::new(),
    };
    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };

    let report = Analyzer::with_defaults(config).analyze(&cli.extraction_json, &cli.zip, &inputs)?;
    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

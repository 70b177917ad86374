//! Shared CLI parsing and logging setup for every binary in this crate.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Common CLI arguments for all binaries
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to the JSON configuration document describing accounts,
    /// markets, and strategy instances.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Overrides the log level from the configuration document.
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Computes every strategy's desired book but never pushes actions to
    /// an account's executor queue.
    #[arg(long)]
    pub dry_run: bool,
}

/// Initialize tracing/logging. `json_logs` selects machine-readable output
/// for log aggregators over the human-readable format used at a terminal.
pub fn init_logging(level: &str, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    if json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init();
    }

    Ok(())
}

// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_pipeline_path;
use crate::types::NamingMode;

/// Command-line arguments for `neuroflow`.
///
/// Run-context flags override the pipeline file's `[run]` section.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "neuroflow",
    version,
    about = "Run a file-artifact pipeline for one subject/session.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_pipeline_path())]
    pub pipeline: PathBuf,

    /// Dataset root directory; must exist.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Subject label (alphanumeric, without `sub-`).
    #[arg(long, value_name = "LABEL")]
    pub subject: Option<String>,

    /// Session label (alphanumeric).
    #[arg(long, value_name = "LABEL")]
    pub session: Option<String>,

    /// Delete pre-existing outputs before each step runs.
    #[arg(long, conflicts_with = "skip_existing")]
    pub overwrite: bool,

    /// Skip steps whose outputs all exist.
    #[arg(long)]
    pub skip_existing: bool,

    /// Write placeholder outputs instead of running actions.
    #[arg(long)]
    pub preview: bool,

    /// File naming mode (run-bids, simplified-bids, desc-only).
    #[arg(long, value_name = "MODE")]
    pub naming: Option<NamingMode>,

    /// Name of the run's logger handle.
    #[arg(long, value_name = "NAME")]
    pub logger: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `NEUROFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate, print steps and the dependency graph, but run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/logging.rs

//! Logging setup for `neuroflow` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `NEUROFLOW_LOG` filter directives (e.g. "debug", "neuroflow=trace")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for tool output.
//!
//! The engine itself never looks a logger up by name: each run carries a
//! [`Logger`] handle in its `RunContext`, and every engine log line is
//! emitted under that handle's span.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Variable read when no `--log-level` is given. Accepts full filter
/// directives, e.g. `neuroflow=debug,info`.
pub const LOG_ENV: &str = "NEUROFLOW_LOG";

/// Install the global subscriber. Call once, from `main`.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level.directive()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("installing the log subscriber")
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Named log handle resolved once per run.
///
/// Cloning is cheap; all clones share the same span.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    span: Span,
}

impl Logger {
    pub fn new(name: &str) -> Self {
        let span = tracing::info_span!("neuroflow", logger = %name);
        Self {
            name: Arc::from(name),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent span for every log line emitted through this handle.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new("neuroflow")
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Logger").field(&self.name).finish()
    }
}

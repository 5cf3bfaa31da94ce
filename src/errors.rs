// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Every failure the engine can raise is a variant of [`NeuroflowError`].
//! Errors escaping a step are wrapped once in [`NeuroflowError::InStep`],
//! which records the call stack that was active; use
//! [`NeuroflowError::root_cause`] to get at the underlying variant.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NeuroflowError {
    /// Invalid run context or pipeline file (missing root, conflicting
    /// idempotency flags, missing session, unknown references).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed step or pipeline declaration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A declared input does not exist on disk.
    #[error("Dependency error: input {path:?} of step '{step}' does not exist")]
    Dependency { step: String, path: PathBuf },

    /// A callback action returned an error.
    #[error("Step '{step}' failed in action '{action}': {source}")]
    StepExecution {
        step: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// An external command exited with a non-zero status.
    #[error("Command `{command}` exited with code {code}: {stderr}")]
    CommandExecution {
        command: String,
        code: i32,
        stderr: String,
    },

    /// An external command could not be started at all.
    #[error("Failed to launch `{command}`: {source}")]
    CommandLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Context attached at the step boundary: `trail` is the call stack
    /// (outermost pipeline first) that was active when `source` was raised.
    #[error("[{trail}] {source}")]
    InStep {
        trail: String,
        #[source]
        source: Box<NeuroflowError>,
    },
}

impl NeuroflowError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NeuroflowError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the active call stack, unless an inner step already did.
    pub fn within(self, trail: &str) -> Self {
        match self {
            err @ NeuroflowError::InStep { .. } => err,
            other => NeuroflowError::InStep {
                trail: trail.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any step context removed.
    pub fn root_cause(&self) -> &NeuroflowError {
        match self {
            NeuroflowError::InStep { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Call stack recorded for this error, if it escaped a step.
    pub fn trail(&self) -> Option<&str> {
        match self {
            NeuroflowError::InStep { trail, .. } => Some(trail),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NeuroflowError>;

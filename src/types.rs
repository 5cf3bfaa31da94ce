// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{NeuroflowError, Result};

/// What a step does when some of its outputs already exist on disk.
///
/// - `None`: leave existing outputs alone and run the action anyway; the
///   action decides how to overwrite.
/// - `Overwrite`: delete pre-existing outputs (unless they are also inputs)
///   before running.
/// - `SkipIfExists`: skip the step when every output exists; when only some
///   exist, delete them and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdempotencyPolicy {
    #[default]
    None,
    Overwrite,
    SkipIfExists,
}

impl IdempotencyPolicy {
    /// Build a policy from the two independent CLI-style flags.
    pub fn from_flags(overwrite: bool, skip_exist: bool) -> Result<Self> {
        match (overwrite, skip_exist) {
            (true, true) => Err(NeuroflowError::Configuration(
                "overwrite and skip-if-exists cannot both be set".to_string(),
            )),
            (true, false) => Ok(IdempotencyPolicy::Overwrite),
            (false, true) => Ok(IdempotencyPolicy::SkipIfExists),
            (false, false) => Ok(IdempotencyPolicy::None),
        }
    }
}

/// How an artifact's file name is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NamingMode {
    /// `sub-<s>_ses-<s>_<entities>_<suffix>[.<ext>]`
    #[default]
    RunBids,
    /// Same as `RunBids` without the `sub`/`ses` entities.
    SimplifiedBids,
    /// `<desc>[.<ext>]`
    DescOnly,
}

impl FromStr for NamingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run-bids" | "run_bids_name" => Ok(NamingMode::RunBids),
            "simplified-bids" | "simplified_bids_name" => Ok(NamingMode::SimplifiedBids),
            "desc-only" | "only_disc" => Ok(NamingMode::DescOnly),
            other => Err(format!(
                "invalid naming mode: {other} (expected \"run-bids\", \"simplified-bids\" or \"desc-only\")"
            )),
        }
    }
}

impl fmt::Display for NamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NamingMode::RunBids => "run-bids",
            NamingMode::SimplifiedBids => "simplified-bids",
            NamingMode::DescOnly => "desc-only",
        };
        f.write_str(s)
    }
}

/// Per-use naming parameters that replace an artifact's defaults.
///
/// Unset fields fall through to the next layer; see [`NameFormat::or`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
pub struct NameFormat {
    #[serde(default)]
    pub naming: Option<NamingMode>,
    /// Whether the extension is appended. Defaults to `true`.
    #[serde(default)]
    pub extension: Option<bool>,
}

impl NameFormat {
    pub fn naming(mode: NamingMode) -> Self {
        Self {
            naming: Some(mode),
            extension: None,
        }
    }

    pub fn without_extension() -> Self {
        Self {
            naming: None,
            extension: Some(false),
        }
    }

    /// Field-wise fallback: values set on `self` win.
    pub fn or(self, fallback: NameFormat) -> NameFormat {
        NameFormat {
            naming: self.naming.or(fallback.naming),
            extension: self.extension.or(fallback.extension),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.naming.is_none() && self.extension.is_none()
    }
}

/// Result of running a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The action ran to completion.
    Executed,
    /// Every output already existed under `skip-if-exists`.
    Skipped,
    /// Preview mode: placeholders were written instead of running the action.
    Previewed,
}

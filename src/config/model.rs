// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::artifact::{Artifact, ArtifactField};
use crate::types::{IdempotencyPolicy, NameFormat, NamingMode};

/// A pipeline file as read from TOML, before any semantic checks.
///
/// ```toml
/// [run]
/// policy = "skip-if-exists"
/// logger = "mefmri"
///
/// [pipeline]
/// name = "preprocess"
/// auto_input = true
/// derivatives_place = ["derivatives", "neuroflow"]
///
/// [artifact.bold]
/// suffix = "bold"
/// datatype = "func"
/// task = "rest"
/// extension = "nii.gz"
///
/// [artifact.bold_despiked]
/// from = "bold"
/// desc = "despike"
///
/// [[step]]
/// name = "despike"
/// inputs = ["bold"]
/// outputs = ["bold_despiked"]
/// cmd = ["3dDespike", ["-prefix=", "@bold_despiked"], "@bold"]
/// ```
///
/// Every section is optional except `[[step]]`; see `validate.rs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPipelineFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Artifacts by key; steps refer to them by that key.
    #[serde(default)]
    pub artifact: BTreeMap<String, ArtifactConfig>,

    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// `[run]` section: defaults for the run context. CLI flags win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub policy: Option<IdempotencyPolicy>,
    #[serde(default)]
    pub naming: Option<NamingMode>,
    #[serde(default)]
    pub logger: Option<String>,
    #[serde(default)]
    pub preview: Option<bool>,
}

/// `[pipeline]` section: the top-level pipeline every step is added to.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    #[serde(default)]
    pub auto_input: bool,

    #[serde(default)]
    pub derivatives_place: Vec<String>,

    #[serde(default)]
    pub data_place: Vec<String>,

    /// Format applied to every artifact use inside the pipeline.
    #[serde(default)]
    pub format: NameFormat,

    /// Replace the inferred output set with these artifact keys.
    #[serde(default)]
    pub outputs: Option<Vec<String>>,
}

fn default_pipeline_name() -> String {
    "pipeline".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            auto_input: false,
            derivatives_place: Vec::new(),
            data_place: Vec::new(),
            format: NameFormat::default(),
            outputs: None,
        }
    }
}

/// `[artifact.<key>]` section.
///
/// Either a full description (with `suffix`), or `from = "<key>"` plus the
/// fields that differ from that artifact.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub acq: Option<String>,
    #[serde(default)]
    pub run: Option<u32>,
    #[serde(default)]
    pub echo: Option<u32>,
    #[serde(default)]
    pub space: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub use_extension: Option<bool>,
    #[serde(default)]
    pub data_place: Option<Vec<String>>,
}

/// One `[[step]]` entry. Steps declared in a file are always commands.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,

    /// Artifact keys; `"@auto"` in first position asks the pipeline.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Field/value predicate for the `"@auto"` input.
    #[serde(default)]
    pub auto_match: BTreeMap<ArtifactField, ScalarValue>,

    #[serde(default)]
    pub outputs: Vec<String>,

    pub cmd: Vec<RawToken>,

    #[serde(default)]
    pub save_stdout_to: Option<String>,

    #[serde(default = "default_true")]
    pub stdout_to_log: bool,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub derivatives_place: Vec<String>,

    #[serde(default)]
    pub data_place: Vec<String>,

    #[serde(default)]
    pub input_format: Option<Vec<NameFormat>>,

    #[serde(default)]
    pub output_format: Option<Vec<NameFormat>>,

    #[serde(default = "default_true")]
    pub append_auto_input: bool,

    #[serde(default)]
    pub preserve_auto_input: bool,
}

fn default_true() -> bool {
    true
}

/// A command token as written: `"text"`, `"@key"`, `"@auto"`, a number,
/// or a nested array for decoration. `"@@x"` is the literal `"@x"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawToken {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<RawToken>),
}

/// A predicate value: entity labels are strings, indices are integers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Int(n) => write!(f, "{n}"),
            ScalarValue::Text(s) => f.write_str(s),
        }
    }
}

/// Marker for the auto input in `inputs` and `cmd`.
pub const AUTO_REF: &str = "@auto";

/// What a `"@..."` string refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    Auto,
    Artifact(&'a str),
    Literal(&'a str),
}

impl RawToken {
    pub fn reference(text: &str) -> Reference<'_> {
        if text == AUTO_REF {
            Reference::Auto
        } else if text.starts_with("@@") {
            Reference::Literal(&text[1..])
        } else if let Some(key) = text.strip_prefix('@') {
            Reference::Artifact(key)
        } else {
            Reference::Literal(text)
        }
    }
}

/// A pipeline file that passed validation.
///
/// Artifacts are fully resolved (`from` chains applied).
#[derive(Debug, Clone)]
pub struct PipelineFile {
    pub run: RunSection,
    pub pipeline: PipelineSection,
    pub artifacts: BTreeMap<String, Artifact>,
    pub steps: Vec<StepConfig>,
}

impl PipelineFile {
    /// Build without running validation. Used by `TryFrom<RawPipelineFile>`.
    pub(crate) fn new_unchecked(
        run: RunSection,
        pipeline: PipelineSection,
        artifacts: BTreeMap<String, Artifact>,
        steps: Vec<StepConfig>,
    ) -> Self {
        Self {
            run,
            pipeline,
            artifacts,
            steps,
        }
    }
}

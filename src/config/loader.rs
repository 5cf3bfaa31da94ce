// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{PipelineFile, RawPipelineFile};
use crate::errors::{NeuroflowError, Result};

/// Read and deserialize a pipeline file without semantic checks.
///
/// Use [`load_and_validate`] for anything that will be built and run.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPipelineFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| NeuroflowError::io(path, e))?;
    let raw: RawPipelineFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a pipeline file and validate it.
///
/// - Reads TOML.
/// - Applies defaults (`serde` + `Default` impls).
/// - Checks artifact keys and references, duplicate step names, and
///   `from` derivation cycles; resolves every artifact.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let raw = load_from_path(&path)?;
    PipelineFile::try_from(raw)
}

/// Same as [`load_and_validate`] for in-memory TOML.
pub fn load_from_str(contents: &str) -> Result<PipelineFile> {
    let raw: RawPipelineFile = toml::from_str(contents)?;
    PipelineFile::try_from(raw)
}

/// `neuroflow.toml` in the current directory.
pub fn default_pipeline_path() -> PathBuf {
    PathBuf::from("neuroflow.toml")
}

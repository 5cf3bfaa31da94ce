// src/config/mod.rs

//! Pipeline files.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a file from disk.
//! - `validate.rs`: reference and key checks, `from` derivation order.
//! - `build.rs`: turning a validated file into a [`crate::pipeline::Pipeline`].

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_pipeline_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ArtifactConfig, PipelineFile, PipelineSection, RawPipelineFile, RawToken, RunSection,
    StepConfig,
};

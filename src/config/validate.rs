// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::artifact::{Artifact, ArtifactField, ArtifactPatch};
use crate::config::model::{
    ArtifactConfig, PipelineFile, RawPipelineFile, RawToken, Reference, StepConfig, AUTO_REF,
};
use crate::errors::{NeuroflowError, Result};

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("artifact key regex is valid"));

impl TryFrom<RawPipelineFile> for PipelineFile {
    type Error = NeuroflowError;

    fn try_from(raw: RawPipelineFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_file(&raw)?;
        let artifacts = resolve_artifacts(&raw.artifact)?;
        Ok(PipelineFile::new_unchecked(
            raw.run,
            raw.pipeline,
            artifacts,
            raw.step,
        ))
    }
}

fn validate_raw_file(raw: &RawPipelineFile) -> Result<()> {
    ensure_has_steps(raw)?;
    validate_artifact_keys(raw)?;
    validate_step_names(raw)?;
    for step in &raw.step {
        validate_step_references(raw, step)?;
    }
    validate_pipeline_outputs(raw)?;
    Ok(())
}

fn config_err(msg: String) -> NeuroflowError {
    NeuroflowError::Configuration(msg)
}

fn ensure_has_steps(raw: &RawPipelineFile) -> Result<()> {
    if raw.step.is_empty() {
        return Err(config_err(
            "pipeline file must contain at least one [[step]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_artifact_keys(raw: &RawPipelineFile) -> Result<()> {
    for (key, artifact) in &raw.artifact {
        if !KEY_RE.is_match(key) {
            return Err(config_err(format!(
                "artifact key '{key}' must start with a letter and contain only letters, digits and '_'"
            )));
        }
        match &artifact.from {
            Some(from) if !raw.artifact.contains_key(from) => {
                return Err(config_err(format!(
                    "artifact '{key}' is derived from unknown artifact '{from}'"
                )));
            }
            Some(from) if from == key => {
                return Err(config_err(format!("artifact '{key}' cannot derive from itself")));
            }
            None if artifact.suffix.is_none() => {
                return Err(config_err(format!(
                    "artifact '{key}' needs either `suffix` or `from`"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_step_names(raw: &RawPipelineFile) -> Result<()> {
    let mut seen = BTreeSet::new();
    for step in &raw.step {
        if step.name.trim().is_empty() {
            return Err(config_err("step names cannot be empty".to_string()));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(config_err(format!("duplicate step name '{}'", step.name)));
        }
    }
    Ok(())
}

fn validate_step_references(raw: &RawPipelineFile, step: &StepConfig) -> Result<()> {
    let known = |key: &str, role: &str| -> Result<()> {
        if raw.artifact.contains_key(key) {
            Ok(())
        } else {
            Err(config_err(format!(
                "step '{}' has unknown artifact '{key}' in `{role}`",
                step.name
            )))
        }
    };

    for (index, input) in step.inputs.iter().enumerate() {
        if input == AUTO_REF {
            if index != 0 {
                return Err(config_err(format!(
                    "step '{}' may only use \"{AUTO_REF}\" as its first input",
                    step.name
                )));
            }
        } else {
            known(input, "inputs")?;
        }
    }

    if !step.auto_match.is_empty() && step.inputs.first().map(String::as_str) != Some(AUTO_REF) {
        return Err(config_err(format!(
            "step '{}' sets `auto_match` but has no \"{AUTO_REF}\" input",
            step.name
        )));
    }

    for output in &step.outputs {
        known(output, "outputs")?;
    }

    if let Some(target) = &step.save_stdout_to {
        known(target, "save_stdout_to")?;
    }

    if step.cmd.is_empty() {
        return Err(config_err(format!("step '{}' has an empty `cmd`", step.name)));
    }

    // With "@auto" the bound input is only known once the pipeline wires it.
    let has_auto = step.inputs.first().map(String::as_str) == Some(AUTO_REF);
    let declared = |key: &str, role: &str| -> Result<()> {
        known(key, role)?;
        if has_auto || step.inputs.iter().chain(&step.outputs).any(|k| k == key) {
            Ok(())
        } else {
            Err(config_err(format!(
                "step '{}' uses artifact '{key}' in `{role}` but lists it in neither `inputs` nor `outputs`",
                step.name
            )))
        }
    };
    validate_tokens(&step.cmd, &declared)
}

fn validate_tokens(tokens: &[RawToken], known: &impl Fn(&str, &str) -> Result<()>) -> Result<()> {
    for token in tokens {
        match token {
            RawToken::Text(text) => {
                if let Reference::Artifact(key) = RawToken::reference(text) {
                    known(key, "cmd")?;
                }
            }
            RawToken::List(inner) => validate_tokens(inner, known)?,
            RawToken::Int(_) | RawToken::Float(_) => {}
        }
    }
    Ok(())
}

fn validate_pipeline_outputs(raw: &RawPipelineFile) -> Result<()> {
    for key in raw.pipeline.outputs.iter().flatten() {
        if !raw.artifact.contains_key(key) {
            return Err(config_err(format!(
                "[pipeline].outputs refers to unknown artifact '{key}'"
            )));
        }
    }
    Ok(())
}

/// Resolve every artifact, bases before the artifacts derived from them.
fn resolve_artifacts(configs: &BTreeMap<String, ArtifactConfig>) -> Result<BTreeMap<String, Artifact>> {
    // Edge direction: from -> derived.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for key in configs.keys() {
        graph.add_node(key.as_str());
    }
    for (key, cfg) in configs {
        if let Some(from) = &cfg.from {
            graph.add_edge(from.as_str(), key.as_str(), ());
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        config_err(format!(
            "cycle detected in artifact derivation involving '{}'",
            cycle.node_id()
        ))
    })?;

    let mut resolved: BTreeMap<String, Artifact> = BTreeMap::new();
    for key in order {
        let cfg = &configs[key];
        let base = match &cfg.from {
            Some(from) => resolved
                .get(from)
                .cloned()
                .ok_or_else(|| config_err(format!("artifact '{from}' was not resolved before '{key}'")))?,
            None => {
                let suffix = cfg
                    .suffix
                    .as_deref()
                    .ok_or_else(|| config_err(format!("artifact '{key}' needs either `suffix` or `from`")))?;
                Artifact::new(suffix)
            }
        };
        let artifact = Artifact::derive_from(&base, &patch_of(cfg))
            .map_err(|e| config_err(format!("artifact '{key}': {e}")))?;
        resolved.insert(key.to_string(), artifact);
    }
    Ok(resolved)
}

fn patch_of(cfg: &ArtifactConfig) -> ArtifactPatch {
    let mut patch = ArtifactPatch::new();
    let text_fields = [
        (ArtifactField::Suffix, &cfg.suffix),
        (ArtifactField::Datatype, &cfg.datatype),
        (ArtifactField::Desc, &cfg.desc),
        (ArtifactField::Task, &cfg.task),
        (ArtifactField::Acq, &cfg.acq),
        (ArtifactField::Space, &cfg.space),
        (ArtifactField::Extension, &cfg.extension),
    ];
    for (field, value) in text_fields {
        if let Some(value) = value {
            patch = patch.set(field, value);
        }
    }
    if let Some(run) = cfg.run {
        patch = patch.set(ArtifactField::Run, run);
    }
    if let Some(echo) = cfg.echo {
        patch = patch.set(ArtifactField::Echo, echo);
    }
    if let Some(use_extension) = cfg.use_extension {
        patch = patch.use_extension(use_extension);
    }
    if let Some(place) = &cfg.data_place {
        patch = patch.data_place(place.iter().cloned());
    }
    patch
}

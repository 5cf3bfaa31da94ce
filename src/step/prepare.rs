// src/step/prepare.rs

//! Pre-flight checks run before a step's action.
//!
//! 1. bind and check inputs
//! 2. bind outputs and create their directories
//! 3. apply the idempotency policy to outputs that already exist

use tracing::{debug, warn};

use crate::artifact::{Artifact, BoundArtifact};
use crate::context::RunContext;
use crate::errors::{NeuroflowError, Result};
use crate::step::{Bindings, Input, Step};
use crate::types::IdempotencyPolicy;

/// Resolved view of a step, ready for dispatch.
#[derive(Debug)]
pub struct Prepared {
    pub inputs: Vec<BoundArtifact>,
    pub outputs: Vec<BoundArtifact>,
    pub skip: bool,
}

impl Prepared {
    /// Binding of `artifact` among this step's inputs, then outputs.
    pub fn find(&self, artifact: &Artifact) -> Option<&BoundArtifact> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .find(|b| b.artifact() == artifact)
    }
}

pub fn prepare(step: &Step, ctx: &RunContext, bindings: &Bindings) -> Result<Prepared> {
    let inputs = bind_inputs(step, ctx, bindings)?;
    let outputs = bind_outputs(step, ctx, &inputs)?;
    let skip = apply_policy(step, ctx, &outputs)?;
    Ok(Prepared {
        inputs,
        outputs,
        skip,
    })
}

fn bind_inputs(step: &Step, ctx: &RunContext, bindings: &Bindings) -> Result<Vec<BoundArtifact>> {
    let span = ctx.logger().span();

    if step.inputs.is_empty() {
        warn!(parent: span, step = %step.name, "step has no inputs");
    }

    let mut bound_inputs = Vec::with_capacity(step.inputs.len());
    for (index, input) in step.inputs.iter().enumerate() {
        let artifact = match input {
            Input::Artifact(artifact) => artifact,
            Input::Auto(_) => {
                return Err(NeuroflowError::Validation(format!(
                    "input {index} of step '{}' is an unresolved auto input; enable auto input on the enclosing pipeline",
                    step.name
                )));
            }
        };

        let positional = step.input_format_at(index);
        if !positional.is_empty() {
            debug!(parent: span, step = %step.name, input = %artifact, format = ?positional, "input format override");
        }

        let bound = bindings.resolve(artifact, ctx, positional);
        let path = bound.resolve_path()?;
        if !path.exists() {
            if ctx.preview() {
                warn!(parent: span, step = %step.name, path = ?path, "input missing (preview)");
            } else {
                return Err(NeuroflowError::Dependency {
                    step: step.name.clone(),
                    path,
                });
            }
        }
        bound_inputs.push(bound);
    }

    Ok(bound_inputs)
}

fn bind_outputs(step: &Step, ctx: &RunContext, inputs: &[BoundArtifact]) -> Result<Vec<BoundArtifact>> {
    let span = ctx.logger().span();

    if step.outputs.is_empty() {
        warn!(
            parent: span,
            step = %step.name,
            "step has no outputs; a step that updates its inputs in place should list them as outputs"
        );
    }

    let mut bound_outputs = Vec::with_capacity(step.outputs.len());
    for (index, artifact) in step.outputs.iter().enumerate() {
        let positional = step.output_format_at(index);
        let requested = ctx.format_override().or(positional);

        // An output that is also an input stays where the input lives.
        let bound = match inputs.iter().find(|b| b.artifact() == artifact) {
            Some(existing) => existing.with_format(requested.or(existing.format())),
            None => BoundArtifact::new(artifact.clone(), ctx.clone(), requested),
        };

        bound.ensure_directory()?;
        bound_outputs.push(bound);
    }

    Ok(bound_outputs)
}

/// Returns `true` when the step should be skipped.
fn apply_policy(step: &Step, ctx: &RunContext, outputs: &[BoundArtifact]) -> Result<bool> {
    let span = ctx.logger().span();
    let policy = ctx.policy();
    let input_set = step.input_set();

    let mut existing = Vec::new();
    for bound in outputs {
        if bound.exists()? {
            existing.push(bound);
        }
    }
    let all_exist = existing.len() == outputs.len();

    for bound in existing.iter().filter(|b| !input_set.contains(b.artifact())) {
        let path = bound.resolve_path()?;
        warn!(parent: span, step = %step.name, path = ?path, "output exists before running and is not an input");

        match policy {
            IdempotencyPolicy::Overwrite => {
                bound.remove()?;
                warn!(parent: span, step = %step.name, path = ?path, "removed pre-existing output (overwrite)");
            }
            IdempotencyPolicy::SkipIfExists if !all_exist => {
                bound.remove()?;
                warn!(
                    parent: span,
                    step = %step.name,
                    path = ?path,
                    "removed partial output; not every output exists (skip-if-exists)"
                );
            }
            _ => {}
        }
    }

    let in_place = step.output_set().is_subset(&input_set);
    let skip = policy == IdempotencyPolicy::SkipIfExists && all_exist && !in_place;
    if skip {
        warn!(parent: span, step = %step.name, "skipping step; every output already exists");
    }

    Ok(skip)
}

// src/step/mod.rs

//! Steps: one unit of work turning input artifacts into output artifacts.
//!
//! - [`action`] defines the three calling conventions (command, callback
//!   with context, plain callback).
//! - [`bindings`] tracks where produced artifacts were placed during a run.
//! - [`prepare`] is the pre-flight stage: input checks, output directories,
//!   idempotency policy.
//!
//! A step moves through `Created -> Validated -> (Skipped | Executed |
//! Failed)`; construction via [`StepBuilder::build`] performs the
//! declaration checks, [`Step::run`] does the rest.

pub mod action;
pub mod bindings;
pub mod prepare;

pub use action::Action;
pub use bindings::Bindings;

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{error, info};

use crate::artifact::{Artifact, AutoInput, BoundArtifact};
use crate::context::RunContext;
use crate::errors::{NeuroflowError, Result};
use crate::exec::runner;
use crate::types::{NameFormat, StepOutcome};

/// One declared input: a concrete artifact, or a request for the
/// pipeline to supply one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Artifact(Artifact),
    Auto(AutoInput),
}

impl From<Artifact> for Input {
    fn from(artifact: Artifact) -> Self {
        Input::Artifact(artifact)
    }
}

impl From<&Artifact> for Input {
    fn from(artifact: &Artifact) -> Self {
        Input::Artifact(artifact.clone())
    }
}

impl From<AutoInput> for Input {
    fn from(auto: AutoInput) -> Self {
        Input::Auto(auto)
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    inputs: Vec<Input>,
    outputs: Vec<Artifact>,
    action: Action,
    derivatives_place: Vec<String>,
    data_place: Vec<String>,
    input_format: Option<Vec<NameFormat>>,
    output_format: Option<Vec<NameFormat>>,
    append_auto_input: bool,
    preserve_auto_input: bool,
}

impl Step {
    pub fn builder(name: impl Into<String>) -> StepBuilder {
        StepBuilder {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            action: None,
            derivatives_place: Vec::new(),
            data_place: Vec::new(),
            input_format: None,
            output_format: None,
            append_auto_input: true,
            preserve_auto_input: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Artifact] {
        &self.outputs
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn derivatives_place(&self) -> &[String] {
        &self.derivatives_place
    }

    pub fn data_place(&self) -> &[String] {
        &self.data_place
    }

    /// Concrete input artifacts (unresolved auto inputs excluded).
    pub fn input_set(&self) -> BTreeSet<Artifact> {
        self.inputs
            .iter()
            .filter_map(|input| match input {
                Input::Artifact(artifact) => Some(artifact.clone()),
                Input::Auto(_) => None,
            })
            .collect()
    }

    pub fn output_set(&self) -> BTreeSet<Artifact> {
        self.outputs.iter().cloned().collect()
    }

    /// The auto-input request in first position, if it is still unresolved.
    pub fn auto_request(&self) -> Option<&AutoInput> {
        match self.inputs.first() {
            Some(Input::Auto(auto)) => Some(auto),
            _ => None,
        }
    }

    pub fn append_auto_input(&self) -> bool {
        self.append_auto_input
    }

    pub fn preserve_auto_input(&self) -> bool {
        self.preserve_auto_input
    }

    /// Replace the unresolved first input with `artifact`.
    pub(crate) fn bind_auto_input(&mut self, artifact: Artifact) {
        if let Some(first) = self.inputs.first_mut() {
            *first = Input::Artifact(artifact);
        }
    }

    /// Every artifact a command names must be a declared input or output.
    ///
    /// While the auto input is unbound the check waits for wiring, since
    /// the command may name the artifact the pool will supply.
    pub(crate) fn check_command_artifacts(&self) -> Result<()> {
        let Action::Command(spec) = &self.action else {
            return Ok(());
        };
        if self.auto_request().is_some() {
            return Ok(());
        }

        let inputs = self.input_set();
        for artifact in spec.referenced_artifacts() {
            if !inputs.contains(artifact) && !self.outputs.contains(artifact) {
                return Err(NeuroflowError::Validation(format!(
                    "{artifact} is used in the command of step '{}' but is neither an input nor an output",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn input_format_at(&self, index: usize) -> NameFormat {
        format_at(&self.input_format, index)
    }

    fn output_format_at(&self, index: usize) -> NameFormat {
        format_at(&self.output_format, index)
    }

    /// Run this step on its own against `ctx`.
    ///
    /// Inputs resolve against the context's origin; use a `Pipeline` to
    /// chain steps so that consumers see where producers put their files.
    pub async fn run(&self, ctx: &RunContext) -> Result<StepOutcome> {
        let mut bindings = Bindings::default();
        self.execute(ctx.clone(), &mut bindings).await
    }

    pub(crate) async fn execute(&self, ctx: RunContext, bindings: &mut Bindings) -> Result<StepOutcome> {
        let ctx = ctx.descend(&self.name, &self.derivatives_place, &self.data_place);
        let trail = ctx.trail();

        let result = self.execute_in(&ctx, bindings).await;
        if let Err(err) = &result {
            error!(parent: ctx.logger().span(), step = %self.name, trail = %trail, error = %err, "step failed");
        }
        result.map_err(|err| err.within(&trail))
    }

    async fn execute_in(&self, ctx: &RunContext, bindings: &mut Bindings) -> Result<StepOutcome> {
        let span = ctx.logger().span();
        info!(parent: span, step = %self.name, trail = %ctx.trail(), "running step");

        let prepared = prepare::prepare(self, ctx, bindings)?;
        for output in &prepared.outputs {
            bindings.record(output);
        }

        if prepared.skip {
            return Ok(StepOutcome::Skipped);
        }

        if ctx.preview() {
            for output in &prepared.outputs {
                output.materialize_placeholder()?;
                info!(parent: span, step = %self.name, path = ?output.resolve_path()?, "wrote preview placeholder");
            }
            return Ok(StepOutcome::Previewed);
        }

        self.dispatch(ctx, &prepared).await?;
        Ok(StepOutcome::Executed)
    }

    async fn dispatch(&self, ctx: &RunContext, prepared: &prepare::Prepared) -> Result<()> {
        let span = ctx.logger().span();
        let action_name = self.action.name();

        match &self.action {
            Action::Command(spec) => {
                let argv = spec.resolve(&self.name, prepared)?;
                info!(parent: span, step = %self.name, action = %action_name, argv = ?argv, "starting action");
                let stdout_target = match spec.stdout_target() {
                    Some(artifact) => Some(prepared.find(artifact).ok_or_else(|| {
                        NeuroflowError::Validation(format!(
                            "save_stdout_to {} of step '{}' is not one of its outputs",
                            artifact, self.name
                        ))
                    })?),
                    None => None,
                };
                runner::run_command(&argv, spec, stdout_target, ctx).await?;
            }
            Action::Context { func, .. } => {
                let (inputs, outputs) = resolved_paths(prepared)?;
                info!(parent: span, step = %self.name, action = %action_name, ?inputs, ?outputs, "starting action");
                let func = func.clone();
                let owned_ctx = ctx.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || func(&inputs, &outputs, &owned_ctx)).await;
                self.check_callback(&action_name, outcome)?;
            }
            Action::Plain { func, .. } => {
                let (inputs, outputs) = resolved_paths(prepared)?;
                info!(parent: span, step = %self.name, action = %action_name, ?inputs, ?outputs, "starting action");
                let func = func.clone();
                let outcome = tokio::task::spawn_blocking(move || func(&inputs, &outputs)).await;
                self.check_callback(&action_name, outcome)?;
            }
        }

        info!(parent: span, step = %self.name, action = %action_name, "finished action");
        Ok(())
    }

    fn check_callback(
        &self,
        action_name: &str,
        outcome: std::result::Result<anyhow::Result<()>, tokio::task::JoinError>,
    ) -> Result<()> {
        let source = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(join_err) => anyhow::Error::new(join_err),
        };
        Err(NeuroflowError::StepExecution {
            step: self.name.clone(),
            action: action_name.to_string(),
            source,
        })
    }
}

fn format_at(formats: &Option<Vec<NameFormat>>, index: usize) -> NameFormat {
    formats
        .as_ref()
        .and_then(|f| f.get(index).copied())
        .unwrap_or_default()
}

fn resolved_paths(prepared: &prepare::Prepared) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let inputs = prepared
        .inputs
        .iter()
        .map(BoundArtifact::resolve_path)
        .collect::<Result<Vec<_>>>()?;
    let outputs = prepared
        .outputs
        .iter()
        .map(BoundArtifact::resolve_path)
        .collect::<Result<Vec<_>>>()?;
    Ok((inputs, outputs))
}

#[derive(Debug, Clone)]
pub struct StepBuilder {
    name: String,
    inputs: Vec<Input>,
    outputs: Vec<Artifact>,
    action: Option<Action>,
    derivatives_place: Vec<String>,
    data_place: Vec<String>,
    input_format: Option<Vec<NameFormat>>,
    output_format: Option<Vec<NameFormat>>,
    append_auto_input: bool,
    preserve_auto_input: bool,
}

impl StepBuilder {
    pub fn input(mut self, input: impl Into<Input>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn inputs<I, T>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Input>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, output: impl Into<Artifact>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn outputs<I>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = Artifact>,
    {
        self.outputs.extend(outputs);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn command(self, spec: crate::exec::CommandSpec) -> Self {
        self.action(Action::Command(spec))
    }

    pub fn derivatives_place<I, S>(mut self, place: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derivatives_place = place.into_iter().map(Into::into).collect();
        self
    }

    pub fn data_place<I, S>(mut self, place: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_place = place.into_iter().map(Into::into).collect();
        self
    }

    /// One format per input, aligned positionally.
    pub fn input_format(mut self, formats: Vec<NameFormat>) -> Self {
        self.input_format = Some(formats);
        self
    }

    /// One format per output, aligned positionally.
    pub fn output_format(mut self, formats: Vec<NameFormat>) -> Self {
        self.output_format = Some(formats);
        self
    }

    /// Offer the first output to later siblings' auto inputs (default on).
    pub fn append_auto_input(mut self, append: bool) -> Self {
        self.append_auto_input = append;
        self
    }

    /// Leave the consumed candidate in the pool for later siblings.
    pub fn preserve_auto_input(mut self, preserve: bool) -> Self {
        self.preserve_auto_input = preserve;
        self
    }

    pub fn build(self) -> Result<Step> {
        let action = self.action.ok_or_else(|| {
            NeuroflowError::Validation(format!("action of step '{}' is not defined", self.name))
        })?;

        check_format_len("input", &self.name, &self.input_format, self.inputs.len())?;
        check_format_len("output", &self.name, &self.output_format, self.outputs.len())?;

        if self.inputs.iter().skip(1).any(|i| matches!(i, Input::Auto(_))) {
            return Err(NeuroflowError::Validation(format!(
                "step '{}': only the first input may be an auto input",
                self.name
            )));
        }

        if let Action::Command(spec) = &action {
            spec.validate(&self.name)?;
            if let Some(target) = spec.stdout_target() {
                if !self.outputs.contains(target) {
                    return Err(NeuroflowError::Validation(format!(
                        "save_stdout_to {target} of step '{}' is not one of its outputs",
                        self.name
                    )));
                }
            }
        }

        let step = Step {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            action,
            derivatives_place: self.derivatives_place,
            data_place: self.data_place,
            input_format: self.input_format,
            output_format: self.output_format,
            append_auto_input: self.append_auto_input,
            preserve_auto_input: self.preserve_auto_input,
        };
        step.check_command_artifacts()?;
        Ok(step)
    }
}

fn check_format_len(kind: &str, step: &str, formats: &Option<Vec<NameFormat>>, expected: usize) -> Result<()> {
    match formats {
        Some(formats) if formats.len() != expected => Err(NeuroflowError::Validation(format!(
            "step '{step}' has {} {kind} formats for {expected} {kind}s",
            formats.len()
        ))),
        _ => Ok(()),
    }
}

// src/pipeline/mod.rs

//! Composite steps.
//!
//! A [`Pipeline`] holds an ordered list of steps and nested pipelines. It
//! infers its own boundary (inputs nobody inside produces, outputs its
//! children produce), auto-wires steps that ask for "the previous output",
//! and runs its children in declared order.
//!
//! - [`wiring`] holds the auto-input pool used during assembly.
//! - [`graph`] builds the producer/consumer graph for inspection.

pub mod graph;
pub mod wiring;

pub use graph::DependencyGraph;
pub use wiring::AutoInputPool;

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::artifact::Artifact;
use crate::context::RunContext;
use crate::errors::{NeuroflowError, Result};
use crate::step::{Bindings, Step};
use crate::types::{NameFormat, StepOutcome};

/// A child of a pipeline.
#[derive(Debug, Clone)]
pub enum Node {
    Step(Step),
    Pipeline(Pipeline),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Step(step) => step.name(),
            Node::Pipeline(pipeline) => pipeline.name(),
        }
    }

    pub fn input_set(&self) -> BTreeSet<Artifact> {
        match self {
            Node::Step(step) => step.input_set(),
            Node::Pipeline(pipeline) => pipeline.input_set(),
        }
    }

    pub fn output_set(&self) -> BTreeSet<Artifact> {
        match self {
            Node::Step(step) => step.output_set(),
            Node::Pipeline(pipeline) => pipeline.output_set(),
        }
    }
}

impl From<Step> for Node {
    fn from(step: Step) -> Self {
        Node::Step(step)
    }
}

impl From<Pipeline> for Node {
    fn from(pipeline: Pipeline) -> Self {
        Node::Pipeline(pipeline)
    }
}

/// Outcome of one leaf step, keyed by its call-stack trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub trail: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    records: Vec<RunRecord>,
}

impl RunSummary {
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn outcome_of(&self, trail: &str) -> Option<StepOutcome> {
        self.records
            .iter()
            .find(|r| r.trail == trail)
            .map(|r| r.outcome)
    }

    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn push(&mut self, trail: String, outcome: StepOutcome) {
        self.records.push(RunRecord { trail, outcome });
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    children: Vec<Node>,
    derivatives_place: Vec<String>,
    data_place: Vec<String>,
    format: NameFormat,
    auto_input: bool,
    pool: AutoInputPool,
    inputs: BTreeSet<Artifact>,
    produced: BTreeSet<Artifact>,
    manual_outputs: Option<BTreeSet<Artifact>>,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            children: Vec::new(),
            derivatives_place: Vec::new(),
            data_place: Vec::new(),
            format: NameFormat::default(),
            auto_input: false,
            manual_outputs: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn derivatives_place(&self) -> &[String] {
        &self.derivatives_place
    }

    pub fn data_place(&self) -> &[String] {
        &self.data_place
    }

    /// Format override applied to every artifact use inside this pipeline.
    pub fn format(&self) -> NameFormat {
        self.format
    }

    pub fn auto_input(&self) -> bool {
        self.auto_input
    }

    /// Candidates left in the auto-input pool after assembly.
    pub fn pool(&self) -> &AutoInputPool {
        &self.pool
    }

    /// Artifacts some child consumes that no child produces.
    pub fn input_set(&self) -> BTreeSet<Artifact> {
        self.inputs.clone()
    }

    /// The manual override if one was given, otherwise everything produced.
    pub fn output_set(&self) -> BTreeSet<Artifact> {
        match &self.manual_outputs {
            Some(outputs) => outputs.clone(),
            None => self.produced.clone(),
        }
    }

    /// Append a step, wiring its auto input and updating the boundary.
    pub fn add_step(&mut self, mut step: Step) -> Result<()> {
        self.check_unique(step.name())?;

        if step.auto_request().is_some() && !self.auto_input {
            return Err(NeuroflowError::Validation(format!(
                "step '{}' requests an auto input, but auto input is disabled on pipeline '{}'",
                step.name(),
                self.name
            )));
        }
        if self.auto_input {
            self.pool.wire(&mut step)?;
        }

        self.extend_boundary(&step.input_set(), step.output_set());
        self.children.push(Node::Step(step));
        Ok(())
    }

    /// Append a nested pipeline; it does not take part in auto-wiring.
    pub fn add_pipeline(&mut self, pipeline: Pipeline) -> Result<()> {
        self.check_unique(pipeline.name())?;
        self.extend_boundary(&pipeline.input_set(), pipeline.output_set());
        self.children.push(Node::Pipeline(pipeline));
        Ok(())
    }

    pub fn add(&mut self, node: impl Into<Node>) -> Result<()> {
        match node.into() {
            Node::Step(step) => self.add_step(step),
            Node::Pipeline(pipeline) => self.add_pipeline(pipeline),
        }
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        if self.children.iter().any(|c| c.name() == name) {
            return Err(NeuroflowError::Validation(format!(
                "pipeline '{}' already has a child named '{name}'",
                self.name
            )));
        }
        Ok(())
    }

    fn extend_boundary(&mut self, inputs: &BTreeSet<Artifact>, outputs: BTreeSet<Artifact>) {
        for input in inputs {
            if !self.produced.contains(input) {
                self.inputs.insert(input.clone());
            }
        }
        // Anything a child produces is never a boundary input.
        for output in &outputs {
            self.inputs.remove(output);
        }
        self.produced.extend(outputs);
    }

    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        DependencyGraph::build(
            self.children
                .iter()
                .map(|c| (c.name(), c.input_set(), c.output_set())),
        )
    }

    /// Run every child in order against `ctx`.
    pub async fn run(&self, ctx: &RunContext) -> Result<RunSummary> {
        let mut bindings = Bindings::default();
        let mut summary = RunSummary::default();
        self.execute(ctx.clone(), &mut bindings, &mut summary).await?;
        Ok(summary)
    }

    pub(crate) fn execute<'a>(
        &'a self,
        ctx: RunContext,
        bindings: &'a mut Bindings,
        summary: &'a mut RunSummary,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let ctx = ctx
                .descend(&self.name, &self.derivatives_place, &self.data_place)
                .with_format(self.format);
            let span = ctx.logger().span();
            info!(parent: span, pipeline = %self.name, trail = %ctx.trail(), children = self.children.len(), "running pipeline");

            for child in &self.children {
                match child {
                    Node::Step(step) => {
                        let outcome = step.execute(ctx.clone(), bindings).await?;
                        summary.push(format!("{}/{}", ctx.trail(), step.name()), outcome);
                    }
                    Node::Pipeline(pipeline) => {
                        pipeline.execute(ctx.clone(), bindings, summary).await?;
                    }
                }
            }

            info!(parent: span, pipeline = %self.name, trail = %ctx.trail(), "finished pipeline");
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    children: Vec<Node>,
    derivatives_place: Vec<String>,
    data_place: Vec<String>,
    format: NameFormat,
    auto_input: bool,
    manual_outputs: Option<BTreeSet<Artifact>>,
}

impl PipelineBuilder {
    pub fn step(mut self, step: Step) -> Self {
        self.children.push(Node::Step(step));
        self
    }

    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.children.push(Node::Pipeline(pipeline));
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn auto_input(mut self, enabled: bool) -> Self {
        self.auto_input = enabled;
        self
    }

    pub fn format(mut self, format: NameFormat) -> Self {
        self.format = format;
        self
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

    /// Replace the inferred output set.
    pub fn outputs<I>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = Artifact>,
    {
        self.manual_outputs = Some(outputs.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let mut pipeline = Pipeline {
            name: self.name,
            children: Vec::with_capacity(self.children.len()),
            derivatives_place: self.derivatives_place,
            data_place: self.data_place,
            format: self.format,
            auto_input: self.auto_input,
            pool: AutoInputPool::default(),
            inputs: BTreeSet::new(),
            produced: BTreeSet::new(),
            manual_outputs: self.manual_outputs,
        };
        for child in self.children {
            pipeline.add(child)?;
        }
        Ok(pipeline)
    }
}

// src/lib.rs

pub mod artifact;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipeline;
pub mod step;
pub mod types;

pub use artifact::{Artifact, ArtifactField, ArtifactPatch, AutoInput, BoundArtifact};
pub use context::RunContext;
pub use errors::{NeuroflowError, Result};
pub use exec::{CommandSpec, Token};
pub use logging::Logger;
pub use pipeline::{Pipeline, RunSummary};
pub use step::{Action, Input, Step};
pub use types::{IdempotencyPolicy, NameFormat, NamingMode, StepOutcome};

use anyhow::Context as _;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::PipelineFile;
use crate::config::loader::load_and_validate;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline file loading and validation
/// - pipeline assembly (auto-wiring, boundary inference)
/// - run context construction (CLI over `[run]`)
/// - the run itself
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let file = load_and_validate(&args.pipeline)
        .with_context(|| format!("loading pipeline file {:?}", args.pipeline))?;
    let pipeline = file.build_pipeline()?;

    if args.dry_run {
        print_dry_run(&file, &pipeline)?;
        return Ok(());
    }

    let ctx = build_context(&args, &file)?;
    let summary = pipeline.run(&ctx).await?;

    info!(
        parent: ctx.logger().span(),
        pipeline = %pipeline.name(),
        executed = summary.count(StepOutcome::Executed),
        skipped = summary.count(StepOutcome::Skipped),
        previewed = summary.count(StepOutcome::Previewed),
        "run finished"
    );
    Ok(())
}

fn build_context(args: &CliArgs, file: &PipelineFile) -> anyhow::Result<RunContext> {
    let run = &file.run;

    let root = args
        .root
        .clone()
        .or_else(|| run.root.clone())
        .context("no dataset root given (use --root or [run].root)")?;
    let subject = args
        .subject
        .clone()
        .or_else(|| run.subject.clone())
        .context("no subject given (use --subject or [run].subject)")?;

    let policy = if args.overwrite || args.skip_existing {
        IdempotencyPolicy::from_flags(args.overwrite, args.skip_existing)?
    } else {
        run.policy.unwrap_or_default()
    };

    let mut builder = RunContext::builder(root, subject)
        .policy(policy)
        .preview(args.preview || run.preview.unwrap_or(false))
        .naming(args.naming.or(run.naming).unwrap_or_default());

    if let Some(session) = args.session.clone().or_else(|| run.session.clone()) {
        builder = builder.session(session);
    }
    if let Some(name) = args.logger.as_deref().or(run.logger.as_deref()) {
        builder = builder.logger(Logger::new(name));
    }

    Ok(builder.build()?)
}

/// Print steps, boundary sets and the dependency graph.
fn print_dry_run(file: &PipelineFile, pipeline: &Pipeline) -> anyhow::Result<()> {
    println!("neuroflow dry-run");
    println!("  pipeline = {}", pipeline.name());
    println!("  auto_input = {}", pipeline.auto_input());
    if !pipeline.derivatives_place().is_empty() {
        println!("  derivatives_place = {:?}", pipeline.derivatives_place());
    }
    println!();

    println!("artifacts ({}):", file.artifacts.len());
    for (key, artifact) in &file.artifacts {
        println!("  - {key}: {artifact}");
    }
    println!();

    println!("steps ({}):", pipeline.children().len());
    for child in pipeline.children() {
        println!("  - {}", child.name());
        print_set("inputs", &child.input_set());
        print_set("outputs", &child.output_set());
        if let pipeline::Node::Step(step) = child {
            if let Action::Command(spec) = step.action() {
                println!("      cmd: {:?}", spec.tokens());
            }
        }
    }
    println!();

    print_set("pipeline inputs", &pipeline.input_set());
    print_set("pipeline outputs", &pipeline.output_set());
    println!();

    let graph = pipeline.dependency_graph()?;
    println!("dependency graph:");
    for (producer, consumer, artifacts) in graph.edges() {
        let labels: Vec<String> = artifacts.iter().map(|a| a.to_string()).collect();
        println!("  {producer} -> {consumer} [{}]", labels.join(", "));
    }
    println!("  order: {}", graph.topological_order()?.join(" -> "));

    Ok(())
}

fn print_set(label: &str, artifacts: &std::collections::BTreeSet<Artifact>) {
    if artifacts.is_empty() {
        return;
    }
    let labels: Vec<String> = artifacts.iter().map(|a| a.to_string()).collect();
    println!("      {label}: {}", labels.join(", "));
}

// src/step/action.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::context::RunContext;
use crate::exec::CommandSpec;

/// Callback receiving resolved input and output paths.
pub type PlainFn = dyn Fn(&[PathBuf], &[PathBuf]) -> anyhow::Result<()> + Send + Sync;

/// Callback that additionally receives the step's run context.
pub type ContextFn =
    dyn Fn(&[PathBuf], &[PathBuf], &RunContext) -> anyhow::Result<()> + Send + Sync;

/// What a step does once its inputs and outputs are resolved.
///
/// The calling convention is chosen when the step is authored.
#[derive(Clone)]
pub enum Action {
    /// Spawn an external process built from a token list.
    Command(CommandSpec),
    /// `f(inputs, outputs, ctx)`
    Context { name: String, func: Arc<ContextFn> },
    /// `f(inputs, outputs)`
    Plain { name: String, func: Arc<PlainFn> },
}

impl Action {
    pub fn command(spec: CommandSpec) -> Self {
        Action::Command(spec)
    }

    pub fn plain<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[PathBuf], &[PathBuf]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Action::Plain {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn with_context<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[PathBuf], &[PathBuf], &RunContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Action::Context {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name used verbatim in log lines and errors.
    pub fn name(&self) -> String {
        match self {
            Action::Command(spec) => spec.program().unwrap_or_else(|| "command".to_string()),
            Action::Context { name, .. } | Action::Plain { name, .. } => name.clone(),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Command(spec) => f.debug_tuple("Command").field(spec).finish(),
            Action::Context { name, .. } => f.debug_struct("Context").field("name", name).finish(),
            Action::Plain { name, .. } => f.debug_struct("Plain").field("name", name).finish(),
        }
    }
}

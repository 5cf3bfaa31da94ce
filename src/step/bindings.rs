// src/step/bindings.rs

use std::collections::HashMap;

use crate::artifact::{Artifact, BoundArtifact};
use crate::context::RunContext;
use crate::types::NameFormat;

/// Where each artifact produced so far in a run was placed.
///
/// Filled in step order; a consumer resolves an input against the binding
/// its producer recorded. Inputs nobody produced resolve against the run's
/// origin context.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    produced: HashMap<Artifact, BoundArtifact>,
}

impl Bindings {
    pub fn record(&mut self, bound: &BoundArtifact) {
        self.produced
            .insert(bound.artifact().clone(), bound.clone());
    }

    pub fn get(&self, artifact: &Artifact) -> Option<&BoundArtifact> {
        self.produced.get(artifact)
    }

    pub fn len(&self) -> usize {
        self.produced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.produced.is_empty()
    }

    /// Bind `artifact` for use as an input in `ctx`.
    ///
    /// Format precedence: `ctx`'s override, then the step's positional
    /// format, then whatever the producer bound.
    pub fn resolve(&self, artifact: &Artifact, ctx: &RunContext, positional: NameFormat) -> BoundArtifact {
        let requested = ctx.format_override().or(positional);
        match self.produced.get(artifact) {
            Some(bound) => bound.with_format(requested.or(bound.format())),
            None => BoundArtifact::new(artifact.clone(), ctx.origin(), requested),
        }
    }
}

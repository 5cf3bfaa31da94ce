// src/pipeline/wiring.rs

//! Auto-input pool filled and drained while a pipeline is assembled.
//!
//! Each step that opts in offers its first output; a later step whose first
//! input is an [`AutoInput`] takes a candidate back out. All of this happens
//! at construction time, so a step always sees the pool as left by every
//! earlier sibling.

use std::collections::BTreeMap;

use tracing::debug;

use crate::artifact::{Artifact, AutoInput};
use crate::errors::{NeuroflowError, Result};
use crate::step::Step;

#[derive(Debug, Clone, Default)]
pub struct AutoInputPool {
    candidates: Vec<Artifact>,
}

impl AutoInputPool {
    pub fn candidates(&self) -> &[Artifact] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn offer(&mut self, artifact: Artifact) {
        if !self.candidates.contains(&artifact) {
            self.candidates.push(artifact);
        }
    }

    /// Pick the candidate `request` refers to.
    ///
    /// The candidate leaves the pool unless `preserve` is set.
    pub fn take(&mut self, step: &str, request: &AutoInput, preserve: bool) -> Result<Artifact> {
        let index = if request.is_empty() {
            self.only_candidate(step)?
        } else {
            self.matching_candidate(step, request)?
        };

        if preserve {
            Ok(self.candidates[index].clone())
        } else {
            Ok(self.candidates.remove(index))
        }
    }

    fn only_candidate(&self, step: &str) -> Result<usize> {
        match self.candidates.len() {
            1 => Ok(0),
            0 => Err(NeuroflowError::Validation(format!(
                "step '{step}' requests an auto input, but the pool is empty"
            ))),
            _ => Err(NeuroflowError::Validation(format!(
                "step '{step}' requests an auto input, but the pool is ambiguous: {}",
                describe(self.candidates.iter())
            ))),
        }
    }

    fn matching_candidate(&self, step: &str, request: &AutoInput) -> Result<usize> {
        let mut registry: BTreeMap<Vec<Option<String>>, Vec<usize>> = BTreeMap::new();
        for (index, candidate) in self.candidates.iter().enumerate() {
            registry
                .entry(request.key_of(candidate))
                .or_default()
                .push(index);
        }

        match registry.get(&request.wanted_key()).map(Vec::as_slice) {
            Some([index]) => Ok(*index),
            Some(many) => Err(NeuroflowError::Validation(format!(
                "auto input of step '{step}' matching {} is ambiguous: {}",
                describe_predicate(request),
                describe(many.iter().map(|i| &self.candidates[*i]))
            ))),
            None => Err(NeuroflowError::Validation(format!(
                "auto input of step '{step}' matching {} found no candidate among: {}",
                describe_predicate(request),
                describe(self.candidates.iter())
            ))),
        }
    }

    /// Resolve `step`'s auto input, then offer its first output if it opts in.
    pub fn wire(&mut self, step: &mut Step) -> Result<()> {
        if let Some(request) = step.auto_request().cloned() {
            let chosen = self.take(step.name(), &request, step.preserve_auto_input())?;
            debug!(step = %step.name(), input = %chosen, "bound auto input");
            step.bind_auto_input(chosen);
            step.check_command_artifacts()?;
        }

        if step.append_auto_input() {
            if let Some(first) = step.outputs().first() {
                self.offer(first.clone());
            }
        }
        Ok(())
    }
}

fn describe<'a>(artifacts: impl Iterator<Item = &'a Artifact>) -> String {
    let labels: Vec<String> = artifacts.map(|a| a.to_string()).collect();
    if labels.is_empty() {
        "(none)".to_string()
    } else {
        labels.join(", ")
    }
}

fn describe_predicate(request: &AutoInput) -> String {
    request
        .predicate()
        .iter()
        .map(|(field, value)| format!("{field}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

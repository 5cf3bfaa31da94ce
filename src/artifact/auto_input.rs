// src/artifact/auto_input.rs

use std::collections::BTreeMap;

use crate::artifact::{Artifact, ArtifactField};
use crate::errors::Result;

/// Placeholder for "an output of an earlier sibling step".
///
/// With an empty predicate the pipeline supplies its only pooled candidate;
/// with field/value pairs it supplies the single candidate whose fields
/// match all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AutoInput {
    predicate: BTreeMap<ArtifactField, String>,
}

impl AutoInput {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matching<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ArtifactField, V)>,
        V: ToString,
    {
        Self {
            predicate: pairs
                .into_iter()
                .map(|(field, value)| (field, value.to_string()))
                .collect(),
        }
    }

    /// Parse `field = value` pairs as written in a pipeline file.
    pub fn from_named<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut predicate = BTreeMap::new();
        for (field, value) in pairs {
            predicate.insert(field.parse::<ArtifactField>()?, value.to_string());
        }
        Ok(Self { predicate })
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_empty()
    }

    pub fn predicate(&self) -> &BTreeMap<ArtifactField, String> {
        &self.predicate
    }

    /// Values of the predicate's fields on `artifact`, in predicate order.
    pub fn key_of(&self, artifact: &Artifact) -> Vec<Option<String>> {
        self.predicate.keys().map(|f| artifact.field(*f)).collect()
    }

    /// The key a matching artifact must have.
    pub fn wanted_key(&self) -> Vec<Option<String>> {
        self.predicate.values().map(|v| Some(v.clone())).collect()
    }

    pub fn matches(&self, artifact: &Artifact) -> bool {
        self.key_of(artifact) == self.wanted_key()
    }
}

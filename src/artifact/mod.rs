// src/artifact/mod.rs

//! Artifacts: named, typed placeholders for files.
//!
//! - [`Artifact`] is the authored, context-free description (suffix,
//!   datatype, entities, extension). Artifacts are plain values; two
//!   artifacts with the same fields denote the same file.
//! - [`naming`] holds the suffix ordering table and name composition.
//! - [`bound`] pairs an artifact with the `RunContext` it resolves against.
//! - [`auto_input`] is the placeholder a step uses to ask its pipeline for
//!   "the previous stage's output".

pub mod auto_input;
pub mod bound;
pub mod naming;

pub use auto_input::AutoInput;
pub use bound::{BoundArtifact, Decoration};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{NeuroflowError, Result};

/// Addressable naming fields of an [`Artifact`].
///
/// Used by patches, auto-input predicates and the pipeline file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactField {
    Suffix,
    Datatype,
    Desc,
    Task,
    Acq,
    Run,
    Echo,
    Space,
    Extension,
}

impl ArtifactField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactField::Suffix => "suffix",
            ArtifactField::Datatype => "datatype",
            ArtifactField::Desc => "desc",
            ArtifactField::Task => "task",
            ArtifactField::Acq => "acq",
            ArtifactField::Run => "run",
            ArtifactField::Echo => "echo",
            ArtifactField::Space => "space",
            ArtifactField::Extension => "extension",
        }
    }
}

impl FromStr for ArtifactField {
    type Err = NeuroflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "suffix" => Ok(ArtifactField::Suffix),
            "datatype" => Ok(ArtifactField::Datatype),
            "desc" => Ok(ArtifactField::Desc),
            "task" => Ok(ArtifactField::Task),
            "acq" => Ok(ArtifactField::Acq),
            "run" => Ok(ArtifactField::Run),
            "echo" => Ok(ArtifactField::Echo),
            "space" => Ok(ArtifactField::Space),
            "extension" => Ok(ArtifactField::Extension),
            other => Err(NeuroflowError::Validation(format!(
                "unknown artifact field '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ArtifactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Artifact {
    suffix: String,
    datatype: Option<String>,
    desc: Option<String>,
    task: Option<String>,
    acq: Option<String>,
    run: Option<u32>,
    echo: Option<u32>,
    space: Option<String>,
    extension: Option<String>,
    use_extension: bool,
    data_place: Vec<String>,
}

impl Artifact {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            datatype: None,
            desc: None,
            task: None,
            acq: None,
            run: None,
            echo: None,
            space: None,
            extension: None,
            use_extension: false,
            data_place: Vec::new(),
        }
    }

    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_acq(mut self, acq: impl Into<String>) -> Self {
        self.acq = Some(acq.into());
        self
    }

    pub fn with_run(mut self, run: u32) -> Self {
        self.run = Some(run);
        self
    }

    pub fn with_echo(mut self, echo: u32) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Always append the extension, even when a use asks for a bare name.
    pub fn with_use_extension(mut self, use_extension: bool) -> Self {
        self.use_extension = use_extension;
        self
    }

    /// Extra folders appended after the context's data prefix.
    pub fn with_data_place<I, S>(mut self, place: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_place = place.into_iter().map(Into::into).collect();
        self
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn use_extension(&self) -> bool {
        self.use_extension
    }

    pub fn data_place(&self) -> &[String] {
        &self.data_place
    }

    /// String value of a naming field, `None` when unset.
    pub fn field(&self, field: ArtifactField) -> Option<String> {
        match field {
            ArtifactField::Suffix => Some(self.suffix.clone()),
            ArtifactField::Datatype => self.datatype.clone(),
            ArtifactField::Desc => self.desc.clone(),
            ArtifactField::Task => self.task.clone(),
            ArtifactField::Acq => self.acq.clone(),
            ArtifactField::Run => self.run.map(|v| v.to_string()),
            ArtifactField::Echo => self.echo.map(|v| v.to_string()),
            ArtifactField::Space => self.space.clone(),
            ArtifactField::Extension => self.extension.clone(),
        }
    }

    fn set_field(&mut self, field: ArtifactField, value: Option<String>) -> Result<()> {
        match field {
            ArtifactField::Suffix => match value {
                Some(v) => self.suffix = v,
                None => {
                    return Err(NeuroflowError::Validation(
                        "the suffix of an artifact cannot be cleared".to_string(),
                    ));
                }
            },
            ArtifactField::Datatype => self.datatype = value,
            ArtifactField::Desc => self.desc = value,
            ArtifactField::Task => self.task = value,
            ArtifactField::Acq => self.acq = value,
            ArtifactField::Run => self.run = parse_index(field, value)?,
            ArtifactField::Echo => self.echo = parse_index(field, value)?,
            ArtifactField::Space => self.space = value,
            ArtifactField::Extension => self.extension = value,
        }
        Ok(())
    }

    /// Copy `source`, replacing only what `patch` names. `source` is untouched.
    pub fn derive_from(source: &Artifact, patch: &ArtifactPatch) -> Result<Artifact> {
        let mut derived = source.clone();
        for (field, value) in &patch.fields {
            derived.set_field(*field, value.clone())?;
        }
        if let Some(use_extension) = patch.use_extension {
            derived.use_extension = use_extension;
        }
        if let Some(place) = &patch.data_place {
            derived.data_place = place.clone();
        }
        Ok(derived)
    }

    /// Derive one artifact per source with the same patch applied.
    pub fn derive_many(sources: &[Artifact], patch: &ArtifactPatch) -> Result<Vec<Artifact>> {
        sources.iter().map(|s| Artifact::derive_from(s, patch)).collect()
    }

    /// Build a family of artifacts from `base` + `shared`, one per variant.
    ///
    /// A variant may not set a field that `shared` already sets.
    pub fn many<I>(base: &Artifact, shared: &ArtifactPatch, variants: I) -> Result<Vec<Artifact>>
    where
        I: IntoIterator<Item = ArtifactPatch>,
    {
        let common = Artifact::derive_from(base, shared)?;
        variants
            .into_iter()
            .map(|variant| {
                let duplicated: Vec<&str> = variant
                    .fields
                    .keys()
                    .filter(|f| shared.fields.contains_key(f))
                    .map(|f| f.as_str())
                    .collect();
                if !duplicated.is_empty() {
                    return Err(NeuroflowError::Validation(format!(
                        "variant sets fields {duplicated:?} that are already set for every artifact"
                    )));
                }
                Artifact::derive_from(&common, &variant)
            })
            .collect()
    }

    /// Context-free label used in log lines and error messages.
    pub fn label(&self) -> String {
        naming::simplified_label(self)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn parse_index(field: ArtifactField, value: Option<String>) -> Result<Option<u32>> {
    value
        .map(|v| {
            v.trim().parse::<u32>().map_err(|_| {
                NeuroflowError::Validation(format!("{field} must be a non-negative integer, got '{v}'"))
            })
        })
        .transpose()
}

/// A set of field overrides applied by [`Artifact::derive_from`].
///
/// Each named field is either replaced by a value or cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPatch {
    fields: BTreeMap<ArtifactField, Option<String>>,
    use_extension: Option<bool>,
    data_place: Option<Vec<String>>,
}

impl ArtifactPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: ArtifactField, value: impl ToString) -> Self {
        self.fields.insert(field, Some(value.to_string()));
        self
    }

    pub fn clear(mut self, field: ArtifactField) -> Self {
        self.fields.insert(field, None);
        self
    }

    pub fn suffix(self, value: impl ToString) -> Self {
        self.set(ArtifactField::Suffix, value)
    }

    pub fn datatype(self, value: impl ToString) -> Self {
        self.set(ArtifactField::Datatype, value)
    }

    pub fn desc(self, value: impl ToString) -> Self {
        self.set(ArtifactField::Desc, value)
    }

    pub fn task(self, value: impl ToString) -> Self {
        self.set(ArtifactField::Task, value)
    }

    pub fn echo(self, value: u32) -> Self {
        self.set(ArtifactField::Echo, value)
    }

    pub fn space(self, value: impl ToString) -> Self {
        self.set(ArtifactField::Space, value)
    }

    pub fn extension(self, value: impl ToString) -> Self {
        self.set(ArtifactField::Extension, value)
    }

    pub fn use_extension(mut self, value: bool) -> Self {
        self.use_extension = Some(value);
        self
    }

    pub fn data_place<I, S>(mut self, place: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_place = Some(place.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.use_extension.is_none() && self.data_place.is_none()
    }
}

// src/artifact/naming.rs

//! File-name composition.
//!
//! BIDS names are an ordered join of `key-value` entities followed by the
//! suffix, e.g. `sub-01_ses-1_task-rest_echo-2_desc-copied_bold.nii`. The
//! entity order depends on the suffix and comes from a closed table.

use crate::artifact::Artifact;
use crate::context::is_valid_label;
use crate::errors::{NeuroflowError, Result};
use crate::types::NamingMode;

const BOLD_ORDER: &[&str] = &[
    "sub", "ses", "task", "acq", "ce", "rec", "dir", "run", "echo", "part", "chunk", "space", "desc",
];

const MP2RAGE_ORDER: &[&str] = &[
    "sub", "ses", "task", "acq", "ce", "rec", "run", "echo", "flip", "inv", "part", "chunk",
    "space", "desc",
];

const T1W_ORDER: &[&str] = &[
    "sub", "ses", "task", "acq", "ce", "rec", "run", "echo", "part", "chunk", "space", "desc",
];

const FMAP_ORDER: &[&str] = &["sub", "ses", "acq", "run", "gre", "chunk", "space", "desc"];

/// Entity order for a suffix, `None` for suffixes outside the table.
pub fn entity_order(suffix: &str) -> Option<&'static [&'static str]> {
    match suffix {
        "bold" => Some(BOLD_ORDER),
        "MP2RAGE" => Some(MP2RAGE_ORDER),
        "T1w" => Some(T1W_ORDER),
        "fmap" => Some(FMAP_ORDER),
        _ => None,
    }
}

/// Subject/session pair used by [`NamingMode::RunBids`].
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
    pub subject: &'a str,
    pub session: Option<&'a str>,
}

/// Compose the file name of `artifact`.
///
/// `extension` asks for the extension; an artifact with `use_extension`
/// set always gets it. Either way the extension must be defined.
pub fn compose(
    artifact: &Artifact,
    identity: Option<Identity<'_>>,
    mode: NamingMode,
    extension: bool,
) -> Result<String> {
    let stem = match mode {
        NamingMode::RunBids => {
            let identity = identity.ok_or_else(|| {
                NeuroflowError::Validation(format!(
                    "run-bids name of {} needs a subject",
                    simplified_label(artifact)
                ))
            })?;
            bids_stem(artifact, Some(identity))?
        }
        NamingMode::SimplifiedBids => bids_stem(artifact, None)?,
        NamingMode::DescOnly => artifact
            .desc
            .clone()
            .ok_or_else(|| {
                NeuroflowError::Validation(format!(
                    "desc-only name of {} needs a desc",
                    simplified_label(artifact)
                ))
            })?,
    };

    if extension || artifact.use_extension {
        match &artifact.extension {
            Some(ext) => Ok(format!("{stem}.{ext}")),
            None => Err(NeuroflowError::Validation(format!(
                "extension of {stem} is not defined, but needed"
            ))),
        }
    } else {
        Ok(stem)
    }
}

fn bids_stem(artifact: &Artifact, identity: Option<Identity<'_>>) -> Result<String> {
    let order = entity_order(&artifact.suffix).ok_or_else(|| {
        NeuroflowError::Validation(format!(
            "unknown suffix '{}' (known: bold, MP2RAGE, T1w, fmap)",
            artifact.suffix
        ))
    })?;

    let mut tokens = Vec::with_capacity(order.len() + 1);
    for key in order {
        let value = match *key {
            "sub" => identity.map(|i| i.subject.to_string()),
            "ses" => identity.and_then(|i| i.session.map(str::to_string)),
            "task" => artifact.task.clone(),
            "acq" => artifact.acq.clone(),
            "run" => artifact.run.map(|v| v.to_string()),
            "echo" => artifact.echo.map(|v| v.to_string()),
            "space" => artifact.space.clone(),
            "desc" => artifact.desc.clone(),
            _ => None,
        };
        if let Some(value) = value {
            if !is_valid_label(&value) {
                return Err(NeuroflowError::Validation(format!(
                    "value '{value}' of entity '{key}' must be alphanumeric"
                )));
            }
            tokens.push(format!("{key}-{value}"));
        }
    }
    tokens.push(artifact.suffix.clone());

    Ok(tokens.join("_"))
}

/// Best-effort simplified name for diagnostics; never fails.
pub fn simplified_label(artifact: &Artifact) -> String {
    match bids_stem(artifact, None) {
        Ok(stem) => stem,
        Err(_) => {
            let mut parts = Vec::new();
            if let Some(desc) = &artifact.desc {
                parts.push(format!("desc-{desc}"));
            }
            parts.push(artifact.suffix.clone());
            parts.join("_")
        }
    }
}

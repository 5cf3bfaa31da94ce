// src/artifact/bound.rs

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::artifact::naming::{self, Identity};
use crate::artifact::Artifact;
use crate::context::RunContext;
use crate::errors::{NeuroflowError, Result};
use crate::types::NameFormat;

/// Content written to every output in preview mode.
pub const PLACEHOLDER_CONTENT: &str = "test";

/// Extra text around a resolved name or path.
///
/// `name_*` wraps the bare file name before it is joined to the directory;
/// `path_*` wraps the final path string. Used when a command needs a
/// sibling file (`<name>.1D`) or a flag glued to the path (`-prefix=<path>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoration {
    pub path_prefix: Option<String>,
    pub name_prefix: Option<String>,
    pub name_suffix: Option<String>,
    pub path_suffix: Option<String>,
}

impl Decoration {
    pub fn is_empty(&self) -> bool {
        self.path_prefix.is_none()
            && self.name_prefix.is_none()
            && self.name_suffix.is_none()
            && self.path_suffix.is_none()
    }
}

/// An artifact resolved against a specific context snapshot and format.
#[derive(Debug, Clone)]
pub struct BoundArtifact {
    artifact: Artifact,
    ctx: RunContext,
    format: NameFormat,
}

impl BoundArtifact {
    pub fn new(artifact: Artifact, ctx: RunContext, format: NameFormat) -> Self {
        Self {
            artifact,
            ctx,
            format,
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn format(&self) -> NameFormat {
        self.format
    }

    /// Same binding, different format.
    pub fn with_format(&self, format: NameFormat) -> BoundArtifact {
        BoundArtifact {
            artifact: self.artifact.clone(),
            ctx: self.ctx.clone(),
            format,
        }
    }

    /// File name under the bound format.
    pub fn resolve_name(&self) -> Result<String> {
        let mode = self.format.naming.unwrap_or(self.ctx.naming());
        let extension = self.format.extension.unwrap_or(true);
        let identity = Identity {
            subject: self.ctx.subject(),
            session: self.ctx.session(),
        };
        naming::compose(&self.artifact, Some(identity), mode, extension)
    }

    /// `root / derivatives prefix / sub[/ses] / datatype / data prefix / data place`
    pub fn resolve_directory(&self) -> PathBuf {
        let mut dir = self.ctx.root().to_path_buf();
        dir.extend(self.ctx.derivatives_prefix());
        dir.push(self.ctx.session_segment());
        if let Some(datatype) = self.artifact.datatype() {
            dir.push(datatype);
        }
        dir.extend(self.ctx.data_prefix());
        dir.extend(self.artifact.data_place());
        dir
    }

    pub fn resolve_path(&self) -> Result<PathBuf> {
        Ok(self.resolve_directory().join(self.resolve_name()?))
    }

    /// Path string with `decoration` applied.
    pub fn decorated(&self, decoration: &Decoration) -> Result<String> {
        let mut name = self.resolve_name()?;
        if let Some(prefix) = &decoration.name_prefix {
            name = format!("{prefix}{name}");
        }
        if let Some(suffix) = &decoration.name_suffix {
            name.push_str(suffix);
        }

        let mut full = self.resolve_directory().join(name).to_string_lossy().into_owned();
        if let Some(prefix) = &decoration.path_prefix {
            full = format!("{prefix}{full}");
        }
        if let Some(suffix) = &decoration.path_suffix {
            full.push_str(suffix);
        }
        Ok(full)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.resolve_path()?.exists())
    }

    /// Create the run directory if needed. Returns `true` when it was created.
    ///
    /// A directory appearing concurrently counts as success.
    pub fn ensure_directory(&self) -> Result<bool> {
        let dir = self.resolve_directory();
        if dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&dir).map_err(|e| NeuroflowError::io(&dir, e))?;
        warn!(
            parent: self.ctx.logger().span(),
            trail = %self.ctx.trail(),
            dir = ?dir,
            "created directory"
        );
        Ok(true)
    }

    /// Write the preview sentinel at the resolved path.
    pub fn materialize_placeholder(&self) -> Result<()> {
        if !self.ctx.preview() {
            return Err(NeuroflowError::Validation(format!(
                "placeholder for {} requested outside preview mode",
                self.artifact.label()
            )));
        }
        let path = self.resolve_path()?;
        fs::write(&path, PLACEHOLDER_CONTENT).map_err(|e| NeuroflowError::io(&path, e))
    }

    /// Delete the resolved file. A missing file is an error.
    pub fn remove(&self) -> Result<()> {
        let path = self.resolve_path()?;
        fs::remove_file(&path).map_err(|e| NeuroflowError::io(&path, e))
    }
}

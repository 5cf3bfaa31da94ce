#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use neuroflow::artifact::BoundArtifact;
use neuroflow::context::RunContextBuilder;
use neuroflow::{Artifact, NameFormat, RunContext};
use tempfile::TempDir;

/// Content written by [`Dataset::seed`].
pub const RAW_CONTENT: &str = "raw";

/// A throwaway dataset root for one subject (and optional session).
pub struct Dataset {
    dir: TempDir,
    subject: String,
    session: Option<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dataset root"),
            subject: "01".to_string(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: &str) -> Self {
        self.session = Some(session.to_string());
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Context builder pre-filled with this dataset's root/subject/session.
    pub fn context(&self) -> RunContextBuilder {
        let builder = RunContext::builder(self.root(), self.subject.clone());
        match &self.session {
            Some(session) => builder.session(session.clone()),
            None => builder,
        }
    }

    /// Default context (no policy, no preview, run-bids naming).
    pub fn ctx(&self) -> RunContext {
        self.context().build().expect("build run context")
    }

    /// Path `artifact` resolves to when nothing in the run produced it.
    pub fn raw_path(&self, ctx: &RunContext, artifact: &Artifact) -> PathBuf {
        BoundArtifact::new(artifact.clone(), ctx.origin(), NameFormat::default())
            .resolve_path()
            .expect("resolve raw path")
    }

    /// Write a raw input file where an unproduced input will be looked up.
    pub fn seed(&self, ctx: &RunContext, artifact: &Artifact) -> PathBuf {
        self.seed_with(ctx, artifact, RAW_CONTENT)
    }

    pub fn seed_with(&self, ctx: &RunContext, artifact: &Artifact, contents: &str) -> PathBuf {
        let path = self.raw_path(ctx, artifact);
        write_file(&path, contents);
        path
    }

    /// Path relative to the dataset root.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

pub fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("read {path:?}: {e}"))
}

/// Every regular file under `root`, relative and sorted.
pub fn list_files(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_string_lossy().into_owned());
            }
        }
    }

    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

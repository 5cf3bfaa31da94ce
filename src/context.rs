// src/context.rs

//! The execution context threaded through a run.
//!
//! A [`RunContext`] is an immutable value. Identity fields (root, subject,
//! session, policy, ...) are validated once at construction and shared
//! behind an `Arc`; the traversal state (call stack, derivatives prefix,
//! data prefix, format override) is owned per value. Descending into a step
//! or pipeline produces a *new* context via [`RunContext::descend`], so a
//! branch can never observe what a sibling branch did to its own copy.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::info;

use crate::errors::{NeuroflowError, Result};
use crate::logging::Logger;
use crate::types::{IdempotencyPolicy, NameFormat, NamingMode};

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("label regex is valid"));

/// BIDS labels are restricted to ASCII letters and digits.
pub(crate) fn is_valid_label(value: &str) -> bool {
    LABEL_RE.is_match(value)
}

#[derive(Debug)]
struct RunIdentity {
    root: PathBuf,
    subject: String,
    session: Option<String>,
    logger: Logger,
    policy: IdempotencyPolicy,
    preview: bool,
    naming: NamingMode,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    identity: Arc<RunIdentity>,
    call_stack: Vec<String>,
    derivatives_prefix: Vec<String>,
    data_prefix: Vec<String>,
    format_override: NameFormat,
}

impl RunContext {
    pub fn builder(root: impl Into<PathBuf>, subject: impl Into<String>) -> RunContextBuilder {
        RunContextBuilder {
            root: root.into(),
            subject: subject.into(),
            session: None,
            logger: None,
            policy: IdempotencyPolicy::None,
            preview: false,
            naming: NamingMode::RunBids,
        }
    }

    pub fn root(&self) -> &Path {
        &self.identity.root
    }

    pub fn subject(&self) -> &str {
        &self.identity.subject
    }

    pub fn session(&self) -> Option<&str> {
        self.identity.session.as_deref()
    }

    pub fn logger(&self) -> &Logger {
        &self.identity.logger
    }

    pub fn policy(&self) -> IdempotencyPolicy {
        self.identity.policy
    }

    pub fn preview(&self) -> bool {
        self.identity.preview
    }

    pub fn naming(&self) -> NamingMode {
        self.identity.naming
    }

    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }

    /// Call stack joined for log lines and error context.
    pub fn trail(&self) -> String {
        self.call_stack.join("/")
    }

    pub fn derivatives_prefix(&self) -> &[String] {
        &self.derivatives_prefix
    }

    pub fn data_prefix(&self) -> &[String] {
        &self.data_prefix
    }

    pub fn format_override(&self) -> NameFormat {
        self.format_override
    }

    /// `<root>/sub-<subject>`
    pub fn subject_dir(&self) -> PathBuf {
        self.root().join(format!("sub-{}", self.subject()))
    }

    /// `<root>/sub-<subject>/ses<session>`; fails when no session is set.
    pub fn session_dir(&self) -> Result<PathBuf> {
        match self.session() {
            Some(session) => Ok(self.subject_dir().join(format!("ses{session}"))),
            None => Err(NeuroflowError::Configuration(format!(
                "session is not defined for subject '{}'",
                self.subject()
            ))),
        }
    }

    /// Relative `sub-<subject>[/ses<session>]` segment.
    pub fn session_segment(&self) -> PathBuf {
        let mut segment = PathBuf::from(format!("sub-{}", self.subject()));
        if let Some(session) = self.session() {
            segment.push(format!("ses{session}"));
        }
        segment
    }

    /// New context for entering a step or pipeline named `name`.
    pub fn descend(&self, name: &str, derivatives_place: &[String], data_place: &[String]) -> RunContext {
        let mut next = self.clone();
        next.call_stack.push(name.to_string());
        next.derivatives_prefix.extend(derivatives_place.iter().cloned());
        next.data_prefix.extend(data_place.iter().cloned());
        next
    }

    /// New context whose format override is layered over the current one.
    ///
    /// Values already set on this context win over `format`.
    pub fn with_format(&self, format: NameFormat) -> RunContext {
        let mut next = self.clone();
        next.format_override = self.format_override.or(format);
        next
    }

    /// The run's starting point: same identity, no traversal state.
    ///
    /// Inputs that no step in the run produced are resolved against this.
    pub fn origin(&self) -> RunContext {
        RunContext {
            identity: Arc::clone(&self.identity),
            call_stack: Vec::new(),
            derivatives_prefix: Vec::new(),
            data_prefix: Vec::new(),
            format_override: NameFormat::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunContextBuilder {
    root: PathBuf,
    subject: String,
    session: Option<String>,
    logger: Option<Logger>,
    policy: IdempotencyPolicy,
    preview: bool,
    naming: NamingMode,
}

impl RunContextBuilder {
    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn policy(mut self, policy: IdempotencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn naming(mut self, naming: NamingMode) -> Self {
        self.naming = naming;
        self
    }

    pub fn build(self) -> Result<RunContext> {
        if !self.root.exists() {
            return Err(NeuroflowError::Configuration(format!(
                "root directory {:?} does not exist",
                self.root
            )));
        }
        if !is_valid_label(&self.subject) {
            return Err(NeuroflowError::Configuration(format!(
                "subject id '{}' must be alphanumeric",
                self.subject
            )));
        }
        if let Some(session) = &self.session {
            if !is_valid_label(session) {
                return Err(NeuroflowError::Configuration(format!(
                    "session id '{session}' must be alphanumeric"
                )));
            }
        }

        let logger = self.logger.unwrap_or_default();
        info!(
            parent: logger.span(),
            root = ?self.root,
            subject = %self.subject,
            session = ?self.session,
            policy = ?self.policy,
            preview = self.preview,
            naming = %self.naming,
            "created run context"
        );

        Ok(RunContext {
            identity: Arc::new(RunIdentity {
                root: self.root,
                subject: self.subject,
                session: self.session,
                logger,
                policy: self.policy,
                preview: self.preview,
                naming: self.naming,
            }),
            call_stack: Vec::new(),
            derivatives_prefix: Vec::new(),
            data_prefix: Vec::new(),
            format_override: NameFormat::default(),
        })
    }
}

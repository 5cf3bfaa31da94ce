// src/exec/command.rs

//! Command token lists and their resolution against a prepared step.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::artifact::{Artifact, AutoInput, BoundArtifact, Decoration};
use crate::errors::{NeuroflowError, Result};
use crate::step::prepare::Prepared;

static SHELL_SAFE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").expect("shell-safe regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

/// One element of a command line before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Passed through unchanged.
    Literal(String),
    Number(Number),
    /// Resolves to the artifact's path; must be an input or output of the step.
    Artifact(Artifact),
    /// Resolves to the step's first input.
    Auto(AutoInput),
    /// An artifact with text glued around it, e.g. `["-prefix=", art]`.
    Decorated(Vec<Token>),
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::Literal(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Literal(value)
    }
}

impl From<i64> for Token {
    fn from(value: i64) -> Self {
        Token::Number(Number::Int(value))
    }
}

impl From<f64> for Token {
    fn from(value: f64) -> Self {
        Token::Number(Number::Float(value))
    }
}

impl From<Artifact> for Token {
    fn from(value: Artifact) -> Self {
        Token::Artifact(value)
    }
}

impl From<&Artifact> for Token {
    fn from(value: &Artifact) -> Self {
        Token::Artifact(value.clone())
    }
}

impl From<AutoInput> for Token {
    fn from(value: AutoInput) -> Self {
        Token::Auto(value)
    }
}

impl From<Vec<Token>> for Token {
    fn from(value: Vec<Token>) -> Self {
        Token::Decorated(value)
    }
}

/// An external command: token list plus output handling.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    tokens: Vec<Token>,
    save_stdout_to: Option<Artifact>,
    stdout_to_log: bool,
    env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            save_stdout_to: None,
            stdout_to_log: true,
            env: BTreeMap::new(),
        }
    }

    /// Also write stdout verbatim to this artifact (which must be an output).
    pub fn save_stdout_to(mut self, artifact: Artifact) -> Self {
        self.save_stdout_to = Some(artifact);
        self
    }

    pub fn stdout_to_log(mut self, enabled: bool) -> Self {
        self.stdout_to_log = enabled;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn stdout_target(&self) -> Option<&Artifact> {
        self.save_stdout_to.as_ref()
    }

    pub fn logs_stdout(&self) -> bool {
        self.stdout_to_log
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// The program name when the first token is a literal.
    pub fn program(&self) -> Option<String> {
        match self.tokens.first() {
            Some(Token::Literal(program)) => Some(program.clone()),
            _ => None,
        }
    }

    /// Shape checks that do not need a run context.
    pub fn validate(&self, step: &str) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(NeuroflowError::Validation(format!(
                "command of step '{step}' has no tokens"
            )));
        }
        for token in &self.tokens {
            match token {
                Token::Auto(auto) if !auto.is_empty() => {
                    return Err(auto_predicate_error(step));
                }
                Token::Decorated(parts) => {
                    split_decorated(step, parts)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Artifacts named by the tokens, decoration anchors included.
    pub fn referenced_artifacts(&self) -> Vec<&Artifact> {
        self.tokens
            .iter()
            .flat_map(|token| match token {
                Token::Artifact(artifact) => vec![artifact],
                Token::Decorated(parts) => parts
                    .iter()
                    .filter_map(|part| match part {
                        Token::Artifact(artifact) => Some(artifact),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Resolve every token to an argv element.
    pub fn resolve(&self, step: &str, prepared: &Prepared) -> Result<Vec<String>> {
        self.tokens
            .iter()
            .map(|token| resolve_token(step, token, prepared))
            .collect()
    }
}

fn resolve_token(step: &str, token: &Token, prepared: &Prepared) -> Result<String> {
    match token {
        Token::Literal(text) => Ok(text.clone()),
        Token::Number(number) => Ok(number.to_string()),
        Token::Artifact(artifact) => {
            let bound = lookup(step, artifact, prepared)?;
            Ok(bound.resolve_path()?.to_string_lossy().into_owned())
        }
        Token::Auto(auto) => {
            if !auto.is_empty() {
                return Err(auto_predicate_error(step));
            }
            let first = prepared.inputs.first().ok_or_else(|| {
                NeuroflowError::Validation(format!(
                    "command of step '{step}' uses the auto input, but the step has no inputs"
                ))
            })?;
            Ok(first.resolve_path()?.to_string_lossy().into_owned())
        }
        Token::Decorated(parts) => {
            let (artifact, decoration) = split_decorated(step, parts)?;
            lookup(step, artifact, prepared)?.decorated(&decoration)
        }
    }
}

fn lookup<'a>(
    step: &str,
    artifact: &Artifact,
    prepared: &'a Prepared,
) -> Result<&'a BoundArtifact> {
    prepared.find(artifact).ok_or_else(|| {
        NeuroflowError::Validation(format!(
            "{artifact} is used in the command of step '{step}' but is neither an input nor an output"
        ))
    })
}

fn auto_predicate_error(step: &str) -> NeuroflowError {
    NeuroflowError::Validation(format!(
        "command of step '{step}' uses an auto input with a match predicate; only inputs may be matched"
    ))
}

/// Split `[before.., artifact, after..]` into the anchor and its decoration.
///
/// One element on a side is path-level; two are path-level (outer) and
/// name-level (inner).
fn split_decorated<'a>(step: &str, parts: &'a [Token]) -> Result<(&'a Artifact, Decoration)> {
    let anchors: Vec<(usize, &Artifact)> = parts
        .iter()
        .enumerate()
        .filter_map(|(i, t)| match t {
            Token::Artifact(artifact) => Some((i, artifact)),
            _ => None,
        })
        .collect();

    let (index, artifact) = match anchors.as_slice() {
        [anchor] => *anchor,
        _ => {
            return Err(NeuroflowError::Validation(format!(
                "decorated token in step '{step}' must contain exactly one artifact, found {}",
                anchors.len()
            )));
        }
    };

    let before = decoration_text(step, &parts[..index])?;
    let after = decoration_text(step, &parts[index + 1..])?;

    let mut decoration = Decoration::default();
    match before.as_slice() {
        [] => {}
        [path] => decoration.path_prefix = Some(path.clone()),
        [path, name] => {
            decoration.path_prefix = Some(path.clone());
            decoration.name_prefix = Some(name.clone());
        }
        _ => return Err(too_much_decoration(step, "before")),
    }
    match after.as_slice() {
        [] => {}
        [path] => decoration.path_suffix = Some(path.clone()),
        [name, path] => {
            decoration.name_suffix = Some(name.clone());
            decoration.path_suffix = Some(path.clone());
        }
        _ => return Err(too_much_decoration(step, "after")),
    }

    Ok((artifact, decoration))
}

fn decoration_text(step: &str, parts: &[Token]) -> Result<Vec<String>> {
    parts
        .iter()
        .map(|part| match part {
            Token::Literal(text) => Ok(text.clone()),
            Token::Number(number) => Ok(number.to_string()),
            _ => Err(NeuroflowError::Validation(format!(
                "decorated token in step '{step}' may only carry text around its artifact"
            ))),
        })
        .collect()
}

fn too_much_decoration(step: &str, side: &str) -> NeuroflowError {
    NeuroflowError::Validation(format!(
        "decorated token in step '{step}' has more than two elements {side} its artifact"
    ))
}

/// Render an argv as a copy-pasteable shell line.
pub fn command_line(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if SHELL_SAFE_RE.is_match(arg) {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

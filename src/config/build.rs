// src/config/build.rs

//! Turn a validated [`PipelineFile`] into a runnable [`Pipeline`].

use crate::artifact::{Artifact, AutoInput};
use crate::config::model::{PipelineFile, RawToken, Reference, StepConfig, AUTO_REF};
use crate::errors::{NeuroflowError, Result};
use crate::exec::{CommandSpec, Number, Token};
use crate::pipeline::Pipeline;
use crate::step::{Input, Step};

impl PipelineFile {
    /// Look up a declared artifact by key.
    pub fn artifact(&self, key: &str) -> Result<&Artifact> {
        self.artifacts.get(key).ok_or_else(|| {
            NeuroflowError::Configuration(format!("unknown artifact '{key}'"))
        })
    }

    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let section = &self.pipeline;
        let mut builder = Pipeline::builder(&section.name)
            .auto_input(section.auto_input)
            .derivatives_place(section.derivatives_place.iter().cloned())
            .data_place(section.data_place.iter().cloned())
            .format(section.format);

        if let Some(keys) = &section.outputs {
            let outputs = keys
                .iter()
                .map(|key| self.artifact(key).cloned())
                .collect::<Result<Vec<_>>>()?;
            builder = builder.outputs(outputs);
        }

        for step in &self.steps {
            builder = builder.step(self.build_step(step)?);
        }
        builder.build()
    }

    fn build_step(&self, cfg: &StepConfig) -> Result<Step> {
        let mut builder = Step::builder(&cfg.name)
            .derivatives_place(cfg.derivatives_place.iter().cloned())
            .data_place(cfg.data_place.iter().cloned())
            .append_auto_input(cfg.append_auto_input)
            .preserve_auto_input(cfg.preserve_auto_input);

        for key in &cfg.inputs {
            let input = if key == AUTO_REF {
                let pairs: Vec<(String, String)> = cfg
                    .auto_match
                    .iter()
                    .map(|(field, value)| (field.to_string(), value.to_string()))
                    .collect();
                Input::Auto(AutoInput::from_named(
                    pairs.iter().map(|(f, v)| (f.as_str(), v.as_str())),
                )?)
            } else {
                Input::Artifact(self.artifact(key)?.clone())
            };
            builder = builder.input(input);
        }

        for key in &cfg.outputs {
            builder = builder.output(self.artifact(key)?.clone());
        }

        if let Some(formats) = &cfg.input_format {
            builder = builder.input_format(formats.clone());
        }
        if let Some(formats) = &cfg.output_format {
            builder = builder.output_format(formats.clone());
        }

        let tokens = cfg
            .cmd
            .iter()
            .map(|raw| self.token(raw))
            .collect::<Result<Vec<_>>>()?;
        let mut spec = CommandSpec::new(tokens).stdout_to_log(cfg.stdout_to_log);
        if let Some(key) = &cfg.save_stdout_to {
            spec = spec.save_stdout_to(self.artifact(key)?.clone());
        }
        for (key, value) in &cfg.env {
            spec = spec.env(key, value);
        }

        builder.command(spec).build()
    }

    fn token(&self, raw: &RawToken) -> Result<Token> {
        Ok(match raw {
            RawToken::Int(n) => Token::Number(Number::Int(*n)),
            RawToken::Float(x) => Token::Number(Number::Float(*x)),
            RawToken::Text(text) => match RawToken::reference(text) {
                Reference::Auto => Token::Auto(AutoInput::any()),
                Reference::Artifact(key) => Token::Artifact(self.artifact(key)?.clone()),
                Reference::Literal(literal) => Token::Literal(literal.to_string()),
            },
            RawToken::List(inner) => Token::Decorated(
                inner
                    .iter()
                    .map(|t| self.token(t))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }
}

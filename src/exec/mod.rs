// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] holds the token model: what a command step's argv is made
//!   of and how each token resolves against a prepared step.
//! - [`runner`] spawns the resolved argv with `tokio::process::Command`,
//!   drains its streams, and turns the exit status into a result.

pub mod command;
pub mod runner;

pub use command::{CommandSpec, Number, Token, command_line};

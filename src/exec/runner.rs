// src/exec/runner.rs

//! External process runner for command steps.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{Span, debug, info, warn};

use crate::artifact::BoundArtifact;
use crate::context::RunContext;
use crate::errors::{NeuroflowError, Result};
use crate::exec::command::{CommandSpec, command_line};

/// Spawn `argv` directly (no shell), wait for it, and report the outcome.
///
/// stderr is drained line by line at debug level; many imaging tools print
/// routine progress there. stdout is collected, optionally logged, and
/// written verbatim to `stdout_target` whether or not the process succeeded.
pub async fn run_command(
    argv: &[String],
    spec: &CommandSpec,
    stdout_target: Option<&BoundArtifact>,
    ctx: &RunContext,
) -> Result<()> {
    let line = command_line(argv);
    let Some((program, args)) = argv.split_first() else {
        return Err(NeuroflowError::Validation("command line is empty".to_string()));
    };

    let span = ctx.logger().span().clone();
    info!(parent: &span, trail = %ctx.trail(), cmd = %line, "starting process");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(spec.env_vars())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| NeuroflowError::CommandLaunch {
        command: line.clone(),
        source,
    })?;

    let stderr_task = tokio::spawn(drain_stderr(child.stderr.take(), span.clone()));
    let stdout_task = tokio::spawn(collect(child.stdout.take()));

    let status = child
        .wait()
        .await
        .map_err(|source| NeuroflowError::io(program, source))?;

    let stderr = stderr_task.await.unwrap_or_else(|err| {
        warn!(parent: &span, cmd = %line, error = %err, "stderr reader did not finish");
        String::new()
    });
    let stdout = match stdout_task.await {
        Ok(read) => read.map_err(|source| NeuroflowError::io(program, source))?,
        Err(err) => {
            warn!(parent: &span, cmd = %line, error = %err, "stdout reader did not finish");
            Vec::new()
        }
    };

    let code = status.code().unwrap_or(-1);
    info!(parent: &span, cmd = %line, exit_code = code, success = status.success(), "process exited");

    // A failing tool's stdout is still kept; it is often the only diagnostic.
    if spec.logs_stdout() {
        for out_line in String::from_utf8_lossy(&stdout).lines() {
            debug!(parent: &span, "stdout: {}", out_line);
        }
    }

    if let Some(target) = stdout_target {
        let path = target.resolve_path()?;
        tokio::fs::write(&path, &stdout)
            .await
            .map_err(|e| NeuroflowError::io(&path, e))?;
        debug!(parent: &span, path = ?path, bytes = stdout.len(), "saved stdout");
    }

    if !status.success() {
        return Err(NeuroflowError::CommandExecution {
            command: line,
            code,
            stderr,
        });
    }

    Ok(())
}

/// Log stderr lines and hand back the full text for error reports.
async fn drain_stderr<R>(stderr: Option<R>, span: Span) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(stderr) = stderr else {
        return captured;
    };

    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(parent: &span, "stderr: {}", line);
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

async fn collect<R>(stream: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

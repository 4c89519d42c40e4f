//! Real command executor implementation.
//!
//! [`RealCommandExecutor`] spawns host commands with `std::process::Command`,
//! streaming their output into the log in real time. The privilege wrapper
//! (if any) is applied before the binary lookup, so `which` resolves `sudo`
//! rather than the wrapped command.

use std::process::{Child, Command, Stdio};
use std::thread;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use which::which;

use super::pipe::{StreamType, panic_message, read_pipe_to_log};
use super::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::error::HostprepError;

/// Kills a child process and joins its reader threads.
///
/// Called from error paths to avoid leaking the process or threads when
/// thread spawning or waiting fails.
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<()>>,
{
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

/// Command executor that runs actual host commands.
///
/// When `dry_run` is true, commands are logged but not executed, and
/// `execute()` returns `Ok(ExecutionResult { status: None })`.
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl RealCommandExecutor {
    fn execution_error(spec: &CommandSpec, status: impl Into<String>) -> anyhow::Error {
        HostprepError::Execution {
            command: spec.display(),
            status: status.into(),
        }
        .into()
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!("dry run: {}", spec.display());
            return Ok(ExecutionResult { status: None });
        }

        let (program, args) = spec.invocation();
        let resolved =
            which(&program).with_context(|| format!("command not found: {}", program))?;
        tracing::trace!("command found: {}: {}", program, resolved.to_string_lossy());

        let mut command = Command::new(resolved);
        command.args(&args);

        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        for (key, value) in &spec.env {
            command.env(key, value);
        }

        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command: {}", spec.display()))?;

        tracing::trace!("spawned command: {}: pid={}", program, child.id());

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // Stream stdout and stderr from separate threads; thread panics are
        // surfaced as execution errors after the command finishes.
        let stdout_handle = match thread::Builder::new()
            .name("stdout-reader".to_string())
            .spawn(move || read_pipe_to_log(stdout_pipe, StreamType::Stdout))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(Self::execution_error(
                    spec,
                    format!("failed to spawn stdout reader thread: {}", e),
                ));
            }
        };

        let stderr_handle = match thread::Builder::new()
            .name("stderr-reader".to_string())
            .spawn(move || read_pipe_to_log(stderr_pipe, StreamType::Stderr))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle]);
                return Err(Self::execution_error(
                    spec,
                    format!("failed to spawn stderr reader thread: {}", e),
                ));
            }
        };

        let status = match child.wait() {
            Ok(s) => s,
            Err(e) => {
                // The process might still be running; kill it so nothing leaks.
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(Self::execution_error(
                    spec,
                    format!("failed to wait for command: {}", e),
                ));
            }
        };

        let mut panicked_streams = Vec::new();
        for (name, handle) in [("stdout", stdout_handle), ("stderr", stderr_handle)] {
            if let Err(e) = handle.join() {
                let msg = panic_message(&*e);
                tracing::error!(stream = name, panic = msg, "reader thread panicked");
                panicked_streams.push(format!("{}: {}", name, msg));
            }
        }

        if !panicked_streams.is_empty() {
            return Err(Self::execution_error(
                spec,
                format!(
                    "reader thread(s) panicked during command execution: {}",
                    panicked_streams.join(", ")
                ),
            ));
        }

        tracing::trace!("executed command: {}: success={}", program, status.success());

        Ok(ExecutionResult {
            status: Some(status),
        })
    }
}

//! Command execution abstraction.
//!
//! Tasks never spawn processes themselves; they build [`CommandSpec`]s and
//! hand them to a [`CommandExecutor`]. The production implementation is
//! [`RealCommandExecutor`]; tests substitute recording doubles.

mod pipe;
mod real;

use std::process::ExitStatus;

use anyhow::Result;
use camino::Utf8PathBuf;

use crate::privilege::PrivilegeMethod;

pub use real::RealCommandExecutor;

/// Formats string arguments into a space-separated, debug-quoted string.
///
/// Used by error messages and dry-run output (e.g. `"install" "-y" "rabbitmq-server"`).
pub(crate) fn format_command_args(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Specification for a host command to be executed.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The command to execute (e.g. "apt-get")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Working directory (optional, defaults to current directory)
    pub cwd: Option<Utf8PathBuf>,
    /// Environment variables to set in addition to the inherited environment
    pub env: Vec<(String, String)>,
    /// Privilege escalation method to wrap the command
    pub privilege: Option<PrivilegeMethod>,
}

impl CommandSpec {
    /// Creates a new spec with command and args.
    #[must_use]
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            privilege: None,
        }
    }

    /// Sets the privilege escalation method.
    #[must_use]
    pub fn with_privilege(mut self, privilege: Option<PrivilegeMethod>) -> Self {
        self.privilege = privilege;
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: Utf8PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Adds multiple environment variables from any iterator of pairs.
    #[must_use]
    pub fn with_envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns the program to spawn and its full argument list, with the
    /// privilege wrapper applied when one is configured.
    ///
    /// With `privilege: Some(Sudo)`, `apt-get install -y foo` becomes
    /// `sudo apt-get install -y foo`.
    pub(crate) fn invocation(&self) -> (String, Vec<String>) {
        match self.privilege {
            Some(method) => {
                let mut args = Vec::with_capacity(self.args.len() + 1);
                args.push(self.command.clone());
                args.extend(self.args.iter().cloned());
                (method.command_name().to_string(), args)
            }
            None => (self.command.clone(), self.args.clone()),
        }
    }

    /// Human-readable rendering for logs and error messages.
    pub(crate) fn display(&self) -> String {
        let (program, args) = self.invocation();
        if args.is_empty() {
            program
        } else {
            format!("{} {}", program, format_command_args(&args))
        }
    }
}

/// Result of command execution.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the command (None in dry-run mode)
    pub status: Option<ExitStatus>,
}

impl ExecutionResult {
    /// Returns true if the command executed successfully.
    ///
    /// Dry-run results (status is None) always count as success.
    pub fn success(&self) -> bool {
        self.status.is_none_or(|s| s.success())
    }

    /// Returns the exit code if available.
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so an `Arc<dyn CommandExecutor>`
/// can be shared with output reader threads during execution.
pub trait CommandExecutor: Send + Sync {
    /// Executes a command with the given specification.
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}

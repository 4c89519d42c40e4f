//! Task module for declarative playbook steps.
//!
//! This module provides the `TaskDefinition` enum — a data-driven abstraction
//! where each variant describes *what* to do to the host, and methods on the
//! enum provide *how* via Rust's exhaustive pattern matching.
//!
//! Adding a new primitive requires:
//! 1. Adding a new variant to `TaskDefinition`
//! 2. Creating a corresponding data struct (e.g., `ServiceTask`)
//! 3. Implementing the match arms in all methods on `TaskDefinition`
//!    (`kind`, `label`, `validate`, `execute`, `resolve_paths`)
//!
//! The compiler enforces exhaustiveness, so no primitive can be half-wired.

pub mod apt_key;
pub mod apt_repository;
pub mod command;
pub mod copy;
pub mod package;
pub mod service;

use std::fs;
use std::sync::OnceLock;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Deserialize;
use tracing::info;

pub use apt_key::AptKeyTask;
pub use apt_repository::AptRepositoryTask;
pub use command::CommandTask;
pub use copy::{CopyTask, FileSource};
pub use package::{PackageState, PackageTask};
pub use service::{ServiceState, ServiceTask};

use crate::error::HostprepError;
use crate::executor::{CommandExecutor, CommandSpec};
use crate::privilege::{Privilege, PrivilegeMethod};

/// Execution context handed to each task.
///
/// Bundles the command executor, the task's resolved privilege method, and
/// the dry-run flag, so task `execute()` signatures stay flat.
pub struct RunContext<'a> {
    executor: &'a dyn CommandExecutor,
    privilege: Option<PrivilegeMethod>,
    dry_run: bool,
}

impl<'a> RunContext<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        privilege: Option<PrivilegeMethod>,
        dry_run: bool,
    ) -> Self {
        Self {
            executor,
            privilege,
            dry_run,
        }
    }

    /// Returns true when side effects must be skipped.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Runs a command through the executor with this context's privilege
    /// method applied, failing on a non-zero exit status.
    pub fn run(&self, spec: CommandSpec) -> Result<()> {
        let spec = spec.with_privilege(self.privilege);
        let result = self.executor.execute(&spec)?;

        if !result.success() {
            let status = result
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown (no status available)".to_string());
            return Err(HostprepError::Execution {
                command: spec.display(),
                status,
            }
            .into());
        }

        Ok(())
    }
}

/// RAII guard to ensure temporary staging file cleanup even on error.
pub(crate) struct TempFileGuard {
    path: Utf8PathBuf,
    dry_run: bool,
}

impl TempFileGuard {
    pub(crate) fn new(path: Utf8PathBuf, dry_run: bool) -> Self {
        Self { path, dry_run }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.dry_run {
            match fs::remove_file(&self.path) {
                Ok(()) => tracing::debug!("cleaned up temp file: {}", self.path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("temp file already removed: {}", self.path);
                }
                Err(e) => {
                    tracing::error!(
                        path = %self.path,
                        error_kind = ?e.kind(),
                        "failed to cleanup temp file: {}",
                        e,
                    );
                }
            }
        }
    }
}

/// Returns a unique staging path under the system temp directory.
pub(crate) fn temp_stage_path(prefix: &str) -> Result<Utf8PathBuf, HostprepError> {
    let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir()).map_err(|p| {
        HostprepError::Validation(format!("temp directory is not valid UTF-8: {}", p.display()))
    })?;
    Ok(dir.join(format!("hostprep-{}-{}", prefix, uuid::Uuid::new_v4())))
}

/// Rejects paths containing `..` components.
pub(crate) fn validate_no_parent_components(
    path: &Utf8Path,
    label: &str,
) -> Result<(), HostprepError> {
    if path
        .components()
        .any(|c| c == camino::Utf8Component::ParentDir)
    {
        return Err(HostprepError::Validation(format!(
            "{} path '{}' contains '..' components, \
            which is not allowed for security reasons",
            label, path
        )));
    }
    Ok(())
}

/// Debian package name, optionally with an `=version` pin suffix.
pub(crate) fn package_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9+.-]+(=[A-Za-z0-9.+:~*-]+)?$")
            .expect("package name regex must compile")
    })
}

/// systemd unit name (service name with optional instance/extension).
///
/// The first character must be alphanumeric so option-like names
/// (e.g. `--now`) cannot reach `systemctl` as arguments.
pub(crate) fn unit_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9:_.@\\-]*$").expect("unit name regex must compile")
    })
}

/// Declarative task definition for playbook steps.
///
/// Each variant holds the data for one provisioning primitive. The enum
/// dispatch pattern gives compile-time exhaustive matching — adding a new
/// variant causes compilation errors at every unhandled match site.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskDefinition {
    /// Ensure packages are present, absent, or at their latest version
    Package(PackageTask),
    /// Install a repository signing key into a keyring
    AptKey(AptKeyTask),
    /// Add an apt source list entry
    AptRepository(AptRepositoryTask),
    /// Drive a systemd service's state and boot enablement
    Service(ServiceTask),
    /// Place a file on the host from a source path or inline content
    Copy(CopyTask),
    /// Run an arbitrary command, with an optional idempotency guard
    Command(CommandTask),
}

impl TaskDefinition {
    /// Returns the primitive name used in logs and `list-tasks` output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::AptKey(_) => "apt_key",
            Self::AptRepository(_) => "apt_repository",
            Self::Service(_) => "service",
            Self::Copy(_) => "copy",
            Self::Command(_) => "command",
        }
    }

    /// Returns a human-readable label with the primitive prefix.
    pub fn label(&self) -> String {
        match self {
            Self::Package(task) => format!("package:{}", task.label()),
            Self::AptKey(task) => format!("apt_key:{}", task.label()),
            Self::AptRepository(task) => format!("apt_repository:{}", task.label()),
            Self::Service(task) => format!("service:{}", task.label()),
            Self::Copy(task) => format!("copy:{}", task.label()),
            Self::Command(task) => format!("command:{}", task.label()),
        }
    }

    /// Validates the task configuration without touching the host.
    pub fn validate(&self) -> Result<(), HostprepError> {
        match self {
            Self::Package(task) => task.validate(),
            Self::AptKey(task) => task.validate(),
            Self::AptRepository(task) => task.validate(),
            Self::Service(task) => task.validate(),
            Self::Copy(task) => task.validate(),
            Self::Command(task) => task.validate(),
        }
    }

    /// Applies the task to the host through the given context.
    pub fn execute(&self, ctx: &RunContext<'_>) -> Result<()> {
        match self {
            Self::Package(task) => task.execute(ctx),
            Self::AptKey(task) => task.execute(ctx),
            Self::AptRepository(task) => task.execute(ctx),
            Self::Service(task) => task.execute(ctx),
            Self::Copy(task) => task.execute(ctx),
            Self::Command(task) => task.execute(ctx),
        }
    }

    /// Resolves relative paths against the playbook file's directory.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        match self {
            Self::Copy(task) => task.resolve_paths(base_dir),
            Self::Command(task) => task.resolve_paths(base_dir),
            Self::Package(_) | Self::AptKey(_) | Self::AptRepository(_) | Self::Service(_) => {}
        }
    }
}

/// A single named playbook step.
///
/// `name` is the operator-facing description; the flattened `definition`
/// carries the `type:` tag and the primitive's parameters.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    /// Human-readable step name, shown in logs and `list-tasks`
    pub name: String,
    /// Per-task privilege setting (inherit / require / disable / explicit)
    #[serde(default)]
    pub privilege: Privilege,
    /// The primitive and its parameters
    #[serde(flatten)]
    pub definition: TaskDefinition,
}

impl Task {
    /// Validates the step name and the underlying definition.
    pub fn validate(&self) -> Result<(), HostprepError> {
        if self.name.trim().is_empty() {
            return Err(HostprepError::Validation(
                "task name must not be empty".to_string(),
            ));
        }
        self.definition.validate()
    }

    /// Executes this task with its resolved privilege method.
    pub fn execute(&self, executor: &dyn CommandExecutor, dry_run: bool) -> Result<()> {
        info!("task '{}' ({})", self.name, self.definition.label());
        let ctx = RunContext::new(executor, self.privilege.resolved_method(), dry_run);
        self.definition.execute(&ctx)
    }
}

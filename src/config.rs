//! Playbook loading and resolution.
//!
//! A playbook is a YAML document with an optional name, optional defaults,
//! and an ordered task list. Loading only parses; callers then `resolve()`
//! the playbook against its file location (relative paths, privilege
//! defaults) and `validate()` it before running.

use std::fs::File;
use std::io::BufReader;

use camino::Utf8Path;
use serde::Deserialize;

use crate::error::HostprepError;
use crate::privilege::PrivilegeDefaults;
use crate::runner::Runner;
use crate::task::Task;

/// Playbook-level default settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Default privilege escalation, inherited by tasks that don't override it
    #[serde(default)]
    pub privilege: Option<PrivilegeDefaults>,
}

/// An ordered list of provisioning steps for one host.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Playbook {
    /// Optional display name for logs
    #[serde(default)]
    pub name: Option<String>,
    /// Playbook-level defaults
    #[serde(default)]
    pub defaults: Option<Defaults>,
    /// Tasks, executed strictly in this order
    pub tasks: Vec<Task>,
}

impl Playbook {
    /// Resolves per-task settings against the playbook's defaults and the
    /// directory containing the playbook file.
    ///
    /// Collapses each task's privilege setting and joins relative task
    /// paths onto `base_dir`. Must be called before `validate()` or running.
    pub fn resolve(&mut self, base_dir: &Utf8Path) -> Result<(), HostprepError> {
        let privilege_defaults = self
            .defaults
            .as_ref()
            .and_then(|d| d.privilege.as_ref())
            .cloned();

        for (index, task) in self.tasks.iter_mut().enumerate() {
            task.privilege
                .resolve_in_place(privilege_defaults.as_ref())
                .map_err(|e| {
                    HostprepError::Validation(format!(
                        "task {} ('{}'): {}",
                        index + 1,
                        task.name,
                        e
                    ))
                })?;
            task.definition.resolve_paths(base_dir);
        }

        Ok(())
    }

    /// Validates every task, without touching the host.
    pub fn validate(&self) -> Result<(), HostprepError> {
        if self.tasks.is_empty() {
            return Err(HostprepError::Validation(
                "playbook has no tasks".to_string(),
            ));
        }
        Runner::new(&self.tasks).validate()
    }

    /// Returns the display name, falling back to a placeholder.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed playbook>")
    }
}

/// Loads a playbook from a YAML file.
///
/// Parse errors are mapped to [`HostprepError::Playbook`] so callers see the
/// offending path and the YAML error location together.
pub fn load_playbook(path: &Utf8Path) -> Result<Playbook, HostprepError> {
    let file = File::open(path).map_err(|e| HostprepError::io(path.to_string(), e))?;
    let reader = BufReader::new(file);
    serde_yaml::from_reader(reader)
        .map_err(|e| HostprepError::Playbook(format!("failed to parse {}: {}", path, e)))
}

//! Package task implementation.
//!
//! Ensures apt packages are present, absent, or at their latest version by
//! invoking `apt-get` with a non-interactive frontend. Names may carry an
//! `=version` pin (e.g. `erlang-base=1:26.2.5-1`); pins are rejected for
//! `state: absent` where they would be meaningless.

use anyhow::Result;
use serde::Deserialize;
use strum::Display;
use tracing::info;

use super::{RunContext, package_name_regex};
use crate::error::HostprepError;
use crate::executor::CommandSpec;

fn default_true() -> bool {
    true
}

/// Target state for the named packages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PackageState {
    /// Installed, without upgrading an already-installed version
    #[default]
    Present,
    /// Removed
    Absent,
    /// Installed and upgraded to the newest available version
    Latest,
}

/// Package task data and execution logic.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageTask {
    /// Package names, each optionally pinned with `=version`
    pub names: Vec<String>,
    /// Target state (default: present)
    #[serde(default)]
    pub state: PackageState,
    /// Run `apt-get update` before the state change
    #[serde(default)]
    pub update_cache: bool,
    /// Pass `--no-install-recommends` when false (default: true)
    #[serde(default = "default_true")]
    pub install_recommends: bool,
}

impl PackageTask {
    /// Returns a human-readable label for this task.
    pub fn label(&self) -> String {
        self.names.join(",")
    }

    /// Validates package names and the state/pin combination.
    pub fn validate(&self) -> Result<(), HostprepError> {
        if self.names.is_empty() {
            return Err(HostprepError::Validation(
                "package task requires at least one name".to_string(),
            ));
        }

        for name in &self.names {
            if !package_name_regex().is_match(name) {
                return Err(HostprepError::Validation(format!(
                    "invalid package name '{}' (expected a Debian package name, \
                    optionally pinned with '=version')",
                    name
                )));
            }
            if self.state == PackageState::Absent && name.contains('=') {
                return Err(HostprepError::Validation(format!(
                    "package '{}' pins a version, which has no effect with state: absent",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Brings the named packages to the target state via `apt-get`.
    pub fn execute(&self, ctx: &RunContext<'_>) -> Result<()> {
        if self.update_cache {
            info!("updating apt package cache");
            ctx.run(apt_get(["update"]))?;
        }

        info!("ensuring {} package(s) {}", self.names.len(), self.state);

        let mut args: Vec<String> = match self.state {
            PackageState::Present => vec!["install".into(), "-y".into(), "--no-upgrade".into()],
            PackageState::Latest => vec!["install".into(), "-y".into()],
            PackageState::Absent => vec!["remove".into(), "-y".into()],
        };
        if !self.install_recommends && self.state != PackageState::Absent {
            args.push("--no-install-recommends".into());
        }
        args.extend(self.names.iter().cloned());

        ctx.run(apt_get(args))
    }
}

/// Builds an `apt-get` spec with the non-interactive frontend set.
fn apt_get<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("apt-get", args).with_env("DEBIAN_FRONTEND", "noninteractive")
}

//! Service task implementation.
//!
//! Drives a systemd unit through `systemctl`: boot enablement first, then
//! the running state, so a freshly-installed service can be enabled and
//! started in a single step.

use anyhow::Result;
use serde::Deserialize;
use strum::Display;
use tracing::info;

use super::{RunContext, unit_name_regex};
use crate::error::HostprepError;
use crate::executor::CommandSpec;

/// Target running state for the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceState {
    Started,
    Stopped,
    Restarted,
    Reloaded,
}

impl ServiceState {
    /// Returns the `systemctl` verb for this state.
    fn verb(&self) -> &'static str {
        match self {
            Self::Started => "start",
            Self::Stopped => "stop",
            Self::Restarted => "restart",
            Self::Reloaded => "reload",
        }
    }
}

/// Service task data and execution logic.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceTask {
    /// systemd unit name (the `.service` suffix may be omitted)
    pub service: String,
    /// Target running state
    #[serde(default)]
    pub state: Option<ServiceState>,
    /// Whether the unit starts at boot
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl ServiceTask {
    /// Returns a human-readable label for this task.
    pub fn label(&self) -> &str {
        &self.service
    }

    /// Validates the unit name and that the task requests at least one change.
    pub fn validate(&self) -> Result<(), HostprepError> {
        if !unit_name_regex().is_match(&self.service) {
            return Err(HostprepError::Validation(format!(
                "invalid service name: '{}'",
                self.service
            )));
        }
        if self.state.is_none() && self.enabled.is_none() {
            return Err(HostprepError::Validation(format!(
                "service task for '{}' must set 'state' and/or 'enabled'",
                self.service
            )));
        }
        Ok(())
    }

    /// Applies enablement and state changes via `systemctl`.
    pub fn execute(&self, ctx: &RunContext<'_>) -> Result<()> {
        if let Some(enabled) = self.enabled {
            let verb = if enabled { "enable" } else { "disable" };
            info!("{} service at boot: {}", verb, self.service);
            ctx.run(CommandSpec::new("systemctl", [verb, self.service.as_str()]))?;
        }

        if let Some(state) = self.state {
            info!("ensuring service {} is {}", self.service, state);
            ctx.run(CommandSpec::new(
                "systemctl",
                [state.verb(), self.service.as_str()],
            ))?;
        }

        Ok(())
    }
}

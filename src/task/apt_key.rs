//! Apt signing key task implementation.
//!
//! Fetches a repository signing key over HTTPS with `curl`, optionally
//! converts it from ASCII armor with `gpg --dearmor`, and installs it into a
//! keyring path (conventionally under `/etc/apt/keyrings`). The download is
//! staged in a unique temp file that an RAII guard removes even on error.

use anyhow::Result;
use camino::Utf8PathBuf;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::{RunContext, TempFileGuard, temp_stage_path};
use crate::error::HostprepError;
use crate::executor::CommandSpec;

fn default_true() -> bool {
    true
}

/// Apt key task data and execution logic.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AptKeyTask {
    /// HTTPS URL of the key to fetch
    pub url: String,
    /// Destination keyring path (e.g. `/etc/apt/keyrings/rabbitmq.gpg`)
    pub keyring: Utf8PathBuf,
    /// Run the key through `gpg --dearmor` (default: true, for armored keys)
    #[serde(default = "default_true")]
    pub dearmor: bool,
}

impl AptKeyTask {
    /// Returns a human-readable label for this task.
    pub fn label(&self) -> &str {
        self.keyring.as_str()
    }

    /// Validates the key URL and keyring destination.
    pub fn validate(&self) -> Result<(), HostprepError> {
        let url = Url::parse(&self.url).map_err(|e| {
            HostprepError::Validation(format!("invalid key url '{}': {}", self.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HostprepError::Validation(format!(
                "key url '{}' must use http or https, got '{}'",
                self.url,
                url.scheme()
            )));
        }

        if !self.keyring.is_absolute() {
            return Err(HostprepError::Validation(format!(
                "keyring path must be absolute: {}",
                self.keyring
            )));
        }
        if self.keyring.parent().is_none_or(|p| p.as_str().is_empty()) {
            return Err(HostprepError::Validation(format!(
                "keyring path has no parent directory: {}",
                self.keyring
            )));
        }

        Ok(())
    }

    /// Fetches the key and installs it into the keyring.
    pub fn execute(&self, ctx: &RunContext<'_>) -> Result<()> {
        info!("installing apt key from {} into {}", self.url, self.keyring);

        let staged = temp_stage_path("key")?;
        let _guard = TempFileGuard::new(staged.clone(), ctx.dry_run());

        ctx.run(CommandSpec::new(
            "curl",
            ["-fsSL", self.url.as_str(), "-o", staged.as_str()],
        ))?;

        // gpg and install do not create parent directories themselves.
        if let Some(parent) = self.keyring.parent() {
            ctx.run(CommandSpec::new("install", ["-d", "-m", "0755", parent.as_str()]))?;
        }

        if self.dearmor {
            ctx.run(CommandSpec::new(
                "gpg",
                [
                    "--batch",
                    "--yes",
                    "--dearmor",
                    "-o",
                    self.keyring.as_str(),
                    staged.as_str(),
                ],
            ))?;
        } else {
            ctx.run(CommandSpec::new(
                "install",
                ["-m", "0644", staged.as_str(), self.keyring.as_str()],
            ))?;
        }

        info!("apt key installed: {}", self.keyring);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::test_support::RecordingExecutor;

    fn task(yaml: &str) -> AptKeyTask {
        serde_yaml::from_str(yaml).expect("apt_key task yaml should parse")
    }

    #[test]
    fn test_validate_accepts_https() {
        let t = task(
            "url: https://keys.example.com/rabbitmq.asc\nkeyring: /etc/apt/keyrings/rabbitmq.gpg",
        );
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let t = task("url: 'not a url'\nkeyring: /etc/apt/keyrings/x.gpg");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("invalid key url"));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let t = task("url: ftp://example.com/key.asc\nkeyring: /etc/apt/keyrings/x.gpg");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("must use http or https"));
    }

    #[test]
    fn test_validate_rejects_relative_keyring() {
        let t = task("url: https://example.com/key.asc\nkeyring: keyrings/x.gpg");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn test_execute_dearmor_command_order() {
        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, true);
        task("url: https://example.com/key.asc\nkeyring: /etc/apt/keyrings/x.gpg")
            .execute(&ctx)
            .unwrap();

        let specs = executor.recorded();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].command, "curl");
        assert_eq!(specs[1].command, "install");
        assert_eq!(specs[1].args[..3], ["-d", "-m", "0755"]);
        assert_eq!(specs[2].command, "gpg");
        assert!(specs[2].args.contains(&"--dearmor".to_string()));
        assert!(specs[2].args.contains(&"/etc/apt/keyrings/x.gpg".to_string()));
    }

    #[test]
    fn test_execute_without_dearmor_uses_install() {
        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, true);
        task(
            "url: https://example.com/key.gpg\nkeyring: /etc/apt/keyrings/x.gpg\ndearmor: false",
        )
        .execute(&ctx)
        .unwrap();

        let specs = executor.recorded();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[2].command, "install");
        assert_eq!(specs[2].args[..2], ["-m", "0644"]);
    }

    #[test]
    fn test_deserialize_rejects_unknown_field() {
        let result: Result<AptKeyTask, _> = serde_yaml::from_str(
            "url: https://example.com/key.asc\nkeyring: /tmp/x.gpg\nkeyserver: pgp.example.com",
        );
        assert!(result.is_err());
    }
}

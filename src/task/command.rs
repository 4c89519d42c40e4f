//! Command task implementation.
//!
//! Runs an arbitrary argv on the host. The `creates` guard makes a command
//! idempotent across runs: when the named path already exists the task is
//! skipped entirely (e.g. a plugin-enable command whose effect is a state
//! file).

use std::collections::BTreeMap;

use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use tracing::info;

use super::RunContext;
use crate::error::HostprepError;
use crate::executor::CommandSpec;

/// Command task data and execution logic.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommandTask {
    /// Program and arguments, exec-style (no shell interpretation)
    pub argv: Vec<String>,
    /// Working directory for the command
    #[serde(default)]
    pub chdir: Option<Utf8PathBuf>,
    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Skip the command when this path already exists
    #[serde(default)]
    pub creates: Option<Utf8PathBuf>,
}

impl CommandTask {
    /// Returns a human-readable label for this task.
    pub fn label(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("<empty>")
    }

    /// Validates the argv and environment keys.
    pub fn validate(&self) -> Result<(), HostprepError> {
        let Some(program) = self.argv.first() else {
            return Err(HostprepError::Validation(
                "command task requires a non-empty argv".to_string(),
            ));
        };
        if program.trim().is_empty() {
            return Err(HostprepError::Validation(
                "command program (argv[0]) must not be empty".to_string(),
            ));
        }
        for key in self.env.keys() {
            if key.is_empty() || key.contains('=') {
                return Err(HostprepError::Validation(format!(
                    "invalid environment variable name: '{}'",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Resolves relative `chdir` and `creates` paths against the playbook
    /// file's directory.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        for path in [&mut self.chdir, &mut self.creates].into_iter().flatten() {
            if path.is_relative() {
                *path = base_dir.join(path.as_path());
            }
        }
    }

    /// Runs the command, honoring the `creates` guard.
    pub fn execute(&self, ctx: &RunContext<'_>) -> Result<()> {
        if let Some(creates) = &self.creates
            && creates.exists()
        {
            info!("skipping command {}: {} already exists", self.label(), creates);
            return Ok(());
        }

        let mut spec = CommandSpec::new(self.argv[0].clone(), self.argv[1..].to_vec())
            .with_envs(self.env.clone());
        if let Some(chdir) = &self.chdir {
            spec = spec.with_cwd(chdir.clone());
        }

        ctx.run(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::test_support::RecordingExecutor;
    use camino::Utf8PathBuf;

    fn task(yaml: &str) -> CommandTask {
        serde_yaml::from_str(yaml).expect("command task yaml should parse")
    }

    #[test]
    fn test_validate_rejects_empty_argv() {
        let t = task("argv: []");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("non-empty argv"));
    }

    #[test]
    fn test_validate_rejects_blank_program() {
        let t = task("argv: ['  ']");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("argv[0]"));
    }

    #[test]
    fn test_validate_rejects_env_key_with_equals() {
        let t = task("argv: [env]\nenv:\n  'BAD=KEY': value");
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_execute_builds_spec() {
        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, false);
        task(
            "argv: [rabbitmq-plugins, enable, rabbitmq_management]\n\
             chdir: /var/lib/rabbitmq\nenv:\n  HOME: /root",
        )
        .execute(&ctx)
        .unwrap();

        let specs = executor.recorded();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].command, "rabbitmq-plugins");
        assert_eq!(specs[0].args, vec!["enable", "rabbitmq_management"]);
        assert_eq!(specs[0].cwd.as_deref(), Some(Utf8Path::new("/var/lib/rabbitmq")));
        assert_eq!(specs[0].env, vec![("HOME".to_string(), "/root".to_string())]);
    }

    #[test]
    fn test_execute_skips_when_creates_exists() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let marker = Utf8PathBuf::from_path_buf(temp_dir.path().join("enabled_plugins"))
            .expect("path should be valid UTF-8");
        std::fs::write(&marker, "[rabbitmq_management].").expect("failed to write marker");

        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, false);
        let mut t = task("argv: [rabbitmq-plugins, enable, rabbitmq_management]");
        t.creates = Some(marker);
        t.execute(&ctx).unwrap();

        assert!(executor.recorded().is_empty(), "guarded command must not run");
    }

    #[test]
    fn test_execute_runs_when_creates_missing() {
        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, false);
        let mut t = task("argv: [rabbitmq-plugins, enable, rabbitmq_management]");
        t.creates = Some("/nonexistent/enabled_plugins".into());
        t.execute(&ctx).unwrap();

        assert_eq!(executor.recorded().len(), 1);
    }

    #[test]
    fn test_resolve_paths() {
        let mut t = task("argv: [make]\nchdir: build\ncreates: build/out.bin");
        t.resolve_paths(Utf8Path::new("/srv/playbooks"));
        assert_eq!(t.chdir.as_deref(), Some(Utf8Path::new("/srv/playbooks/build")));
        assert_eq!(
            t.creates.as_deref(),
            Some(Utf8Path::new("/srv/playbooks/build/out.bin"))
        );
    }
}

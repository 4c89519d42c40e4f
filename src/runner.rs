//! Sequential task runner.
//!
//! The runner walks the playbook's task list strictly in order, blocking on
//! each task before starting the next and aborting on the first failure.
//! Host state mutated by one task (an added repository, an installed
//! package) is visible to every later task; there is no parallelism and no
//! retry policy, by design of the declarative format.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::error::HostprepError;
use crate::executor::CommandExecutor;
use crate::task::Task;

/// Sequential runner over a borrowed task slice.
pub struct Runner<'a> {
    tasks: &'a [Task],
}

impl<'a> Runner<'a> {
    /// Creates a runner for the given tasks.
    pub fn new(tasks: &'a [Task]) -> Self {
        Self { tasks }
    }

    /// Returns the number of tasks.
    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Validates all tasks, enriching errors with the task position.
    ///
    /// `Validation` errors get the task index and name prepended; `Io`
    /// errors keep their `source` for programmatic inspection and get the
    /// position prepended to their `context`. Any other variant is wrapped
    /// in `Validation` so no future variant loses position information.
    pub fn validate(&self) -> Result<(), HostprepError> {
        for (index, task) in self.tasks.iter().enumerate() {
            task.validate().map_err(|e| match e {
                HostprepError::Validation(msg) => HostprepError::Validation(format!(
                    "task {} ('{}') validation failed: {}",
                    index + 1,
                    task.name,
                    msg
                )),
                HostprepError::Io {
                    context,
                    message,
                    source,
                } => HostprepError::Io {
                    context: format!(
                        "task {} ('{}') validation failed: {}",
                        index + 1,
                        task.name,
                        context
                    ),
                    message,
                    source,
                },
                other => HostprepError::Validation(format!(
                    "task {} ('{}') validation failed: {}",
                    index + 1,
                    task.name,
                    other
                )),
            })?;
        }
        Ok(())
    }

    /// Returns the zero-based starting index for the run.
    ///
    /// With `start_at: Some(name)`, returns the position of the first task
    /// whose name matches exactly; unknown names are a validation error so a
    /// typo can't silently run the whole playbook.
    fn start_index(&self, start_at: Option<&str>) -> Result<usize, HostprepError> {
        match start_at {
            None => Ok(0),
            Some(name) => self
                .tasks
                .iter()
                .position(|t| t.name == name)
                .ok_or_else(|| {
                    HostprepError::Validation(format!("no task named '{}' to start at", name))
                }),
        }
    }

    /// Executes the tasks in order, aborting on the first failure.
    pub fn run(
        &self,
        executor: Arc<dyn CommandExecutor>,
        dry_run: bool,
        start_at: Option<&str>,
    ) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let start = self.start_index(start_at)?;
        let total = self.total_tasks();
        if start > 0 {
            info!("starting at task {}/{}, skipping {} earlier task(s)", start + 1, total, start);
        }

        info!("running {} task(s)", total - start);

        for (index, task) in self.tasks.iter().enumerate().skip(start) {
            info!("task {}/{}: {}", index + 1, total, task.name);
            task.execute(executor.as_ref(), dry_run)
                .with_context(|| format!("failed to run task {} ('{}')", index + 1, task.name))?;
        }

        info!("playbook completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks_from_yaml(yaml: &str) -> Vec<Task> {
        serde_yaml::from_str(yaml).expect("task list yaml should parse")
    }

    #[test]
    fn test_validate_names_failing_task() {
        let tasks = tasks_from_yaml(
            r#"
- name: fine
  type: command
  argv: [systemctl, daemon-reload]
- name: broken
  type: package
  names: []
"#,
        );
        let err = Runner::new(&tasks).validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("task 2 ('broken') validation failed"), "got: {}", msg);
    }

    #[test]
    fn test_validate_preserves_io_source() {
        let tasks = tasks_from_yaml(
            r#"
- name: missing source
  type: copy
  src: /nonexistent/pin.pref
  dest: /etc/apt/preferences.d/erlang
"#,
        );
        let err = Runner::new(&tasks).validate().unwrap_err();
        match err {
            HostprepError::Io { context, source, .. } => {
                assert!(context.contains("task 1 ('missing source')"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got: {}", other),
        }
    }

    #[test]
    fn test_start_index_unknown_name() {
        let tasks = tasks_from_yaml(
            r#"
- name: only task
  type: command
  argv: [systemctl, daemon-reload]
"#,
        );
        let err = Runner::new(&tasks).start_index(Some("nope")).unwrap_err();
        assert!(err.to_string().contains("no task named 'nope'"));
    }

    #[test]
    fn test_start_index_first_match() {
        let tasks = tasks_from_yaml(
            r#"
- name: one
  type: command
  argv: [a]
- name: two
  type: command
  argv: [b]
"#,
        );
        let runner = Runner::new(&tasks);
        assert_eq!(runner.start_index(None).unwrap(), 0);
        assert_eq!(runner.start_index(Some("two")).unwrap(), 1);
    }

    #[test]
    fn test_run_empty_is_noop() {
        let runner = Runner::new(&[]);
        let executor: Arc<dyn CommandExecutor> =
            Arc::new(crate::executor::RealCommandExecutor { dry_run: true });
        runner.run(executor, true, None).unwrap();
    }
}

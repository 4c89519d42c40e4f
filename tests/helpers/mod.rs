use std::sync::Mutex;

use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use hostprep::executor::{CommandExecutor, CommandSpec, ExecutionResult};

/// Executor double that records every spec it receives.
///
/// With `fail_at: Some(n)`, the n-th call (zero-based) fails after being
/// recorded, so tests can assert that later tasks never ran.
#[derive(Default)]
pub struct MockExecutor {
    pub specs: Mutex<Vec<CommandSpec>>,
    pub fail_at: Option<usize>,
}

impl MockExecutor {
    #[allow(dead_code)]
    pub fn failing_at(index: usize) -> Self {
        Self {
            specs: Mutex::new(Vec::new()),
            fail_at: Some(index),
        }
    }

    #[allow(dead_code)]
    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.specs.lock().expect("specs lock poisoned").clone()
    }
}

impl CommandExecutor for MockExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        let mut specs = self.specs.lock().expect("specs lock poisoned");
        specs.push(spec.clone());
        if self.fail_at == Some(specs.len() - 1) {
            bail!("injected failure for {}", spec.command);
        }
        Ok(ExecutionResult { status: None })
    }
}

/// Writes a playbook file into the given directory and returns its path.
#[allow(dead_code)]
pub fn write_playbook(dir: &tempfile::TempDir, yaml: &str) -> Utf8PathBuf {
    let path = dir.path().join("playbook.yaml");
    std::fs::write(&path, yaml).expect("failed to write playbook");
    Utf8PathBuf::from_path_buf(path).expect("playbook path should be valid UTF-8")
}

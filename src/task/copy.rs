//! Copy task implementation.
//!
//! Places a file on the host from either an external source path or inline
//! content. The two are mutually exclusive, enforced at deserialization by a
//! custom visitor so malformed YAML fails at parse time with a descriptive
//! error. Content is staged in a temp file and placed with `install(1)`
//! through the executor, so privilege escalation applies to the final write.

use std::fmt;
use std::fs;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde::de::{self, MapAccess, Visitor};
use tracing::info;

use super::{RunContext, TempFileGuard, temp_stage_path, validate_no_parent_components};
use crate::error::HostprepError;
use crate::executor::CommandSpec;

const DEFAULT_MODE: &str = "0644";

/// File source for a copy task.
///
/// Represents exactly one of `src` (external file) or `content` (inline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// External source file path
    Src(Utf8PathBuf),
    /// Inline file content
    Content(String),
}

/// Copy task data and execution logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    /// File source: external path or inline content
    source: FileSource,
    /// Absolute destination path on the host
    dest: Utf8PathBuf,
    /// Octal permission string (default "0644")
    mode: Option<String>,
}

impl<'de> Deserialize<'de> for CopyTask {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(field_identifier, rename_all = "lowercase")]
        enum Field {
            Src,
            Content,
            Dest,
            Mode,
        }

        struct CopyTaskVisitor;

        impl<'de> Visitor<'de> for CopyTaskVisitor {
            type Value = CopyTask;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a copy task with 'dest' and either 'src' or 'content'")
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<CopyTask, V::Error>
            where
                V: MapAccess<'de>,
            {
                let mut src: Option<Utf8PathBuf> = None;
                let mut content: Option<String> = None;
                let mut dest: Option<Utf8PathBuf> = None;
                let mut mode: Option<String> = None;

                while let Some(key) = map.next_key()? {
                    match key {
                        Field::Src => {
                            if src.is_some() {
                                return Err(de::Error::duplicate_field("src"));
                            }
                            src = Some(map.next_value()?);
                        }
                        Field::Content => {
                            if content.is_some() {
                                return Err(de::Error::duplicate_field("content"));
                            }
                            content = Some(map.next_value()?);
                        }
                        Field::Dest => {
                            if dest.is_some() {
                                return Err(de::Error::duplicate_field("dest"));
                            }
                            dest = Some(map.next_value()?);
                        }
                        Field::Mode => {
                            if mode.is_some() {
                                return Err(de::Error::duplicate_field("mode"));
                            }
                            mode = Some(map.next_value()?);
                        }
                    }
                }

                let source = match (src, content) {
                    (Some(_), Some(_)) => {
                        return Err(de::Error::custom("'src' and 'content' are mutually exclusive"));
                    }
                    (None, None) => {
                        return Err(de::Error::custom(
                            "either 'src' or 'content' must be specified",
                        ));
                    }
                    (Some(s), None) => FileSource::Src(s),
                    (None, Some(c)) => FileSource::Content(c),
                };

                let dest = dest.ok_or_else(|| de::Error::missing_field("dest"))?;

                Ok(CopyTask { source, dest, mode })
            }
        }

        const FIELDS: &[&str] = &["src", "content", "dest", "mode"];
        deserializer.deserialize_struct("CopyTask", FIELDS, CopyTaskVisitor)
    }
}

impl CopyTask {
    /// Creates a copy task with the default mode.
    pub fn new(source: FileSource, dest: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source,
            dest: dest.into(),
            mode: None,
        }
    }

    /// Creates a copy task with an explicit octal mode string.
    pub fn with_mode(
        source: FileSource,
        dest: impl Into<Utf8PathBuf>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            source,
            dest: dest.into(),
            mode: Some(mode.into()),
        }
    }

    /// Returns a human-readable label for this task.
    pub fn label(&self) -> &str {
        self.dest.as_str()
    }

    /// Returns the source file path if this task uses an external file.
    pub fn src_path(&self) -> Option<&Utf8Path> {
        match &self.source {
            FileSource::Src(path) => Some(path),
            FileSource::Content(_) => None,
        }
    }

    /// Resolves a relative `src` against the playbook file's directory.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        if let FileSource::Src(path) = &mut self.source
            && path.is_relative()
        {
            *path = base_dir.join(path.as_path());
        }
    }

    /// Validates the destination, mode, and source.
    pub fn validate(&self) -> Result<(), HostprepError> {
        if !self.dest.is_absolute() {
            return Err(HostprepError::Validation(format!(
                "copy dest must be an absolute path: {}",
                self.dest
            )));
        }

        if let Some(mode) = &self.mode {
            let parsed = u32::from_str_radix(mode, 8).map_err(|_| {
                HostprepError::Validation(format!(
                    "copy mode must be an octal permission string like '0644': {}",
                    mode
                ))
            })?;
            if parsed > 0o7777 {
                return Err(HostprepError::Validation(format!(
                    "copy mode out of range: {}",
                    mode
                )));
            }
        }

        match &self.source {
            FileSource::Src(src) => {
                validate_no_parent_components(src, "copy source")?;
                let metadata = fs::metadata(src).map_err(|e| {
                    HostprepError::io(format!("failed to read copy source metadata: {}", src), e)
                })?;
                if !metadata.is_file() {
                    return Err(HostprepError::Validation(format!(
                        "copy source is not a file: {}",
                        src
                    )));
                }
                Ok(())
            }
            FileSource::Content(content) => {
                if content.trim().is_empty() {
                    return Err(HostprepError::Validation(
                        "inline copy content must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Stages the source and installs it at the destination.
    pub fn execute(&self, ctx: &RunContext<'_>) -> Result<()> {
        info!("copying to {}: {}", self.dest, self.source_name());

        let staged = temp_stage_path("copy")?;
        let _guard = TempFileGuard::new(staged.clone(), ctx.dry_run());

        if !ctx.dry_run() {
            match &self.source {
                FileSource::Src(src) => {
                    fs::copy(src, &staged).with_context(|| {
                        format!("failed to stage copy source {} at {}", src, staged)
                    })?;
                }
                FileSource::Content(content) => {
                    fs::write(&staged, content).with_context(|| {
                        format!("failed to stage inline content at {}", staged)
                    })?;
                }
            }
        }

        let mode = self.mode.as_deref().unwrap_or(DEFAULT_MODE);
        ctx.run(CommandSpec::new(
            "install",
            ["-D", "-m", mode, staged.as_str(), self.dest.as_str()],
        ))
    }

    fn source_name(&self) -> &str {
        match &self.source {
            FileSource::Src(path) => path.as_str(),
            FileSource::Content(_) => "<inline>",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::test_support::RecordingExecutor;

    #[test]
    fn test_deserialize_content() {
        let t: CopyTask = serde_yaml::from_str(
            "content: |\n  Package: erlang*\n  Pin: version 1:26*\ndest: /etc/apt/preferences.d/erlang",
        )
        .unwrap();
        assert_eq!(t.label(), "/etc/apt/preferences.d/erlang");
        assert!(t.src_path().is_none());
    }

    #[test]
    fn test_deserialize_rejects_both_sources() {
        let result: Result<CopyTask, _> =
            serde_yaml::from_str("src: a.conf\ncontent: x\ndest: /etc/a.conf");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("mutually exclusive"), "got: {}", err);
    }

    #[test]
    fn test_deserialize_rejects_neither_source() {
        let result: Result<CopyTask, _> = serde_yaml::from_str("dest: /etc/a.conf");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("either 'src' or 'content'"), "got: {}", err);
    }

    #[test]
    fn test_deserialize_rejects_missing_dest() {
        let result: Result<CopyTask, _> = serde_yaml::from_str("content: hello");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_relative_dest() {
        let t = CopyTask::new(FileSource::Content("x".to_string()), "etc/a.conf");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("absolute path"));
    }

    #[test]
    fn test_validate_rejects_bad_mode() {
        let t = CopyTask::with_mode(FileSource::Content("x".to_string()), "/etc/a.conf", "rw-r");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("octal permission"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_mode() {
        let t = CopyTask::with_mode(FileSource::Content("x".to_string()), "/etc/a.conf", "17777");
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_content() {
        let t = CopyTask::new(FileSource::Content("  \n".to_string()), "/etc/a.conf");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_validate_missing_src() {
        let t = CopyTask::new(FileSource::Src("/nonexistent/source.conf".into()), "/etc/a.conf");
        let err = t.validate().unwrap_err();
        assert!(matches!(err, HostprepError::Io { .. }));
    }

    #[test]
    fn test_validate_src_with_parent_components() {
        let t = CopyTask::new(FileSource::Src("../secrets".into()), "/etc/a.conf");
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("'..' components"));
    }

    #[test]
    fn test_resolve_paths_joins_relative_src() {
        let mut t = CopyTask::new(FileSource::Src("files/pin".into()), "/etc/a.conf");
        t.resolve_paths(Utf8Path::new("/playbooks"));
        assert_eq!(t.src_path(), Some(Utf8Path::new("/playbooks/files/pin")));
    }

    #[test]
    fn test_resolve_paths_keeps_absolute_src() {
        let mut t = CopyTask::new(FileSource::Src("/abs/pin".into()), "/etc/a.conf");
        t.resolve_paths(Utf8Path::new("/playbooks"));
        assert_eq!(t.src_path(), Some(Utf8Path::new("/abs/pin")));
    }

    #[test]
    fn test_execute_installs_with_mode() {
        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, true);
        CopyTask::with_mode(FileSource::Content("data".to_string()), "/etc/a.conf", "0600")
            .execute(&ctx)
            .unwrap();

        let specs = executor.recorded();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].command, "install");
        assert_eq!(specs[0].args[..3], ["-D", "-m", "0600"]);
        assert_eq!(specs[0].args.last().unwrap(), "/etc/a.conf");
    }

    #[test]
    fn test_execute_dry_run_writes_no_files() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let dest = Utf8PathBuf::from_path_buf(temp_dir.path().join("erlang.pref"))
            .expect("path should be valid UTF-8");

        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, true);
        CopyTask::new(FileSource::Content("Pin-Priority: 1001\n".to_string()), dest.clone())
            .execute(&ctx)
            .unwrap();

        let specs = executor.recorded();
        assert_eq!(specs.len(), 1);
        let staged = Utf8Path::new(&specs[0].args[3]);
        assert!(!staged.exists(), "staging file must not be created in dry-run");
        assert!(!dest.exists(), "destination must not be written in dry-run");
    }

    #[test]
    fn test_execute_stages_external_source() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let src = Utf8PathBuf::from_path_buf(temp_dir.path().join("pin.conf"))
            .expect("path should be valid UTF-8");
        fs::write(&src, "Pin-Priority: 1001\n").expect("failed to write source");

        let executor = RecordingExecutor::default();
        let ctx = RunContext::new(&executor, None, false);
        CopyTask::new(FileSource::Src(src), "/etc/apt/preferences.d/erlang")
            .execute(&ctx)
            .unwrap();

        let specs = executor.recorded();
        assert_eq!(specs[0].args[..3], ["-D", "-m", "0644"]);
    }
}

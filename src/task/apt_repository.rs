//! Apt repository task implementation.
//!
//! Writes a one-line `deb`/`deb-src` source entry into
//! `/etc/apt/sources.list.d/<filename>.list`. The entry is staged in a temp
//! file and placed with `install(1)` through the executor, so privilege
//! escalation applies to the final write. Optionally refreshes the package
//! cache afterwards so the new repository is immediately usable.

use std::fs;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::{RunContext, TempFileGuard, temp_stage_path};
use crate::error::HostprepError;
use crate::executor::CommandSpec;

const SOURCES_DIR: &str = "/etc/apt/sources.list.d";

fn filename_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("filename regex must compile"))
}

/// Apt repository task data and execution logic.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AptRepositoryTask {
    /// Full source line, e.g.
    /// `deb [signed-by=/etc/apt/keyrings/rabbitmq.gpg] https://deb.example.com/rabbitmq noble main`
    pub repo: String,
    /// Basename for the list file (without the `.list` extension)
    pub filename: String,
    /// Run `apt-get update` after adding the entry
    #[serde(default)]
    pub update_cache: bool,
}

impl AptRepositoryTask {
    /// Returns a human-readable label for this task.
    pub fn label(&self) -> &str {
        &self.filename
    }

    fn list_path(&self) -> String {
        format!("{}/{}.list", SOURCES_DIR, self.filename)
    }

    /// Extracts the archive URL token from the source line.
    ///
    /// The line format is `deb [options] <url> <suite> [components...]`;
    /// the URL is the first token after the type and the optional bracketed
    /// options block.
    fn archive_url(&self) -> Option<&str> {
        let mut tokens = self.repo.split_whitespace().skip(1);
        match tokens.next()? {
            options if options.starts_with('[') => {
                // Options may span tokens until the closing bracket.
                if !options.ends_with(']') {
                    for token in tokens.by_ref() {
                        if token.ends_with(']') {
                            break;
                        }
                    }
                }
                tokens.next()
            }
            url => Some(url),
        }
    }

    /// Validates the source line shape, the embedded URL, and the filename.
    pub fn validate(&self) -> Result<(), HostprepError> {
        let line = self.repo.trim();
        if !line.starts_with("deb ") && !line.starts_with("deb-src ") {
            return Err(HostprepError::Validation(format!(
                "repo line must start with 'deb' or 'deb-src': {}",
                self.repo
            )));
        }

        let url = self.archive_url().ok_or_else(|| {
            HostprepError::Validation(format!("repo line has no archive URL: {}", self.repo))
        })?;
        let parsed = Url::parse(url).map_err(|e| {
            HostprepError::Validation(format!("invalid archive URL '{}': {}", url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HostprepError::Validation(format!(
                "archive URL '{}' must use http or https, got '{}'",
                url,
                parsed.scheme()
            )));
        }

        if !filename_regex().is_match(&self.filename) {
            return Err(HostprepError::Validation(format!(
                "repository filename must be a single path component \
                (letters, digits, '.', '_', '-'): {}",
                self.filename
            )));
        }
        if self.filename.ends_with(".list") {
            return Err(HostprepError::Validation(format!(
                "repository filename must not include the '.list' extension: {}",
                self.filename
            )));
        }

        Ok(())
    }

    /// Stages the source line and installs it into the sources directory.
    pub fn execute(&self, ctx: &RunContext<'_>) -> Result<()> {
        let dest = self.list_path();
        info!("adding apt repository entry: {}", dest);

        let staged = temp_stage_path("repo")?;
        let _guard = TempFileGuard::new(staged.clone(), ctx.dry_run());

        if !ctx.dry_run() {
            fs::write(&staged, format!("{}\n", self.repo.trim()))
                .with_context(|| format!("failed to stage repository entry at {}", staged))?;
        }

        ctx.run(CommandSpec::new(
            "install",
            ["-D", "-m", "0644", staged.as_str(), dest.as_str()],
        ))?;

        if self.update_cache {
            info!("updating apt package cache");
            ctx.run(
                CommandSpec::new("apt-get", ["update"])
                    .with_env("DEBIAN_FRONTEND", "noninteractive"),
            )?;
        }

        Ok(())
    }
}

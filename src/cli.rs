use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply the given playbook to this host
    Apply(ApplyArgs),

    /// Validate the given YAML playbook
    Validate(ValidateArgs),

    /// List the tasks that apply would execute, in order
    ListTasks(ListTasksArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to the YAML playbook
    #[arg(short, long, default_value = "playbook.yaml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Do not run, just show what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Start the run at the task with this exact name
    #[arg(long, value_name = "NAME")]
    pub start_at_task: Option<String>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the YAML playbook to validate
    #[arg(short, long, default_value = "playbook.yaml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct ListTasksArgs {
    /// Path to the YAML playbook
    #[arg(short, long, default_value = "playbook.yaml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "warn")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

/// Log levels controlling the verbosity of output.
///
/// Maps directly onto the `tracing` level filter; `--log-level debug` turns
/// on debug output for a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Commands {
    /// Returns the log level requested by the subcommand, if it has one.
    pub fn log_level(&self) -> Option<LogLevel> {
        match self {
            Self::Apply(opts) => Some(opts.log_level),
            Self::Validate(opts) => Some(opts.log_level),
            Self::ListTasks(opts) => Some(opts.log_level),
            Self::Completions(_) => None,
        }
    }
}

pub fn parse_args() -> Result<Cli> {
    Ok(Cli::parse())
}

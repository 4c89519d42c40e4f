pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod privilege;
pub mod runner;
pub mod task;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

pub use error::HostprepError;

use crate::executor::CommandExecutor;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Returns the directory containing the playbook file, used to resolve
/// relative task paths.
fn playbook_base_dir(file: &Utf8Path) -> Utf8PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    }
}

/// Loads, resolves, and validates a playbook from the given file.
fn load_resolved(file: &Utf8Path) -> Result<config::Playbook> {
    let mut playbook = config::load_playbook(file)
        .with_context(|| format!("failed to load playbook from {}", file))?;
    playbook
        .resolve(&playbook_base_dir(file))
        .context("failed to resolve playbook settings")?;
    playbook.validate().context("playbook validation failed")?;
    Ok(playbook)
}

/// Applies a playbook to this host through the given executor.
pub fn run_apply(opts: &cli::ApplyArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let playbook = load_resolved(&opts.file)?;

    info!("applying playbook: {}", playbook.display_name());
    if opts.dry_run {
        info!("dry run: no host state will be changed");
    }

    runner::Runner::new(&playbook.tasks).run(
        executor,
        opts.dry_run,
        opts.start_at_task.as_deref(),
    )
}

/// Loads and validates a playbook without executing anything.
pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let playbook = load_resolved(&opts.file)?;
    info!("validation successful:\n{:#?}", playbook);
    Ok(())
}

/// Writes the ordered task list to the given writer.
///
/// Output goes through a writer rather than the log so it stays machine-
/// and eye-readable regardless of log level.
pub fn list_tasks(playbook: &config::Playbook, out: &mut impl Write) -> Result<()> {
    writeln!(out, "playbook: {}", playbook.display_name())?;
    for (index, task) in playbook.tasks.iter().enumerate() {
        writeln!(out, "  {}. {} ({})", index + 1, task.name, task.definition.kind())?;
    }
    Ok(())
}

/// Prints the tasks that `apply` would execute, in order.
pub fn run_list_tasks(opts: &cli::ListTasksArgs) -> Result<()> {
    let playbook = load_resolved(&opts.file)?;
    list_tasks(&playbook, &mut std::io::stdout().lock())
}

/// Generates shell completions on stdout.
pub fn run_completions(opts: &cli::CompletionsArgs) {
    use clap::CommandFactory;

    let mut cmd = cli::Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(opts.shell, &mut cmd, name, &mut std::io::stdout());
}

use std::process;
use std::sync::Arc;

use anyhow::Result;
use tracing::error;

use hostprep::cli::{self, Commands, LogLevel};
use hostprep::executor::{CommandExecutor, RealCommandExecutor};

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    let log_level = args.command.log_level().unwrap_or(LogLevel::Warn);
    hostprep::init_logging(log_level)?;

    let result = match &args.command {
        Commands::Apply(opts) => {
            let executor: Arc<dyn CommandExecutor> = Arc::new(RealCommandExecutor {
                dry_run: opts.dry_run,
            });
            hostprep::run_apply(opts, executor)
        }
        Commands::Validate(opts) => hostprep::run_validate(opts),
        Commands::ListTasks(opts) => hostprep::run_list_tasks(opts),
        Commands::Completions(opts) => {
            hostprep::run_completions(opts);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}

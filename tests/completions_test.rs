//! Tests for shell completion generation.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use clap_complete::Shell;
use hostprep::cli::{Cli, Commands};

#[test]
fn test_completions_command_parsing() -> Result<()> {
    let shells = [
        ("bash", Shell::Bash),
        ("zsh", Shell::Zsh),
        ("fish", Shell::Fish),
        ("powershell", Shell::PowerShell),
        ("elvish", Shell::Elvish),
    ];

    for (shell_str, expected_shell) in shells {
        let args = Cli::parse_from(["hostprep", "completions", shell_str]);
        match args.command {
            Commands::Completions(opts) => {
                assert_eq!(opts.shell, expected_shell, "Mismatched shell for '{}'", shell_str);
            }
            _ => panic!("Expected Completions command for shell '{}'", shell_str),
        }
    }

    Ok(())
}

#[test]
fn test_completions_generation_is_nonempty() -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    let mut buffer = Vec::new();

    for shell in Shell::value_variants() {
        buffer.clear();
        generate(*shell, &mut cmd, "hostprep", &mut buffer);
        assert!(!buffer.is_empty(), "Generated completion for {:?} was empty", shell);
    }

    Ok(())
}

#[test]
fn test_completions_rejects_unknown_shell() {
    let result = Cli::try_parse_from(["hostprep", "completions", "tcsh"]);
    assert!(result.is_err());
}

//! Error handling and display for the CLI.

use colored::Colorize;
use jci_stacks::StacksError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Stack not found: {name}")]
    UnknownStack { name: String, available: Vec<String> },

    #[error(transparent)]
    Stacks(#[from] StacksError),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let Some(cli_err) = err.downcast_ref::<CliError>() else {
        return;
    };
    match cli_err {
        CliError::UnknownStack { available, .. } => {
            eprintln!(
                "\n{} {}",
                "Hint: Known stacks are".yellow(),
                available.join(", ").yellow()
            );
        }
        CliError::Stacks(StacksError::Settings { .. }) => {
            eprintln!(
                "\n{}",
                "Hint: Fix the settings file or point JCI_SETTINGS_FILE at another one.".yellow()
            );
        }
        CliError::Stacks(e) if e.is_reference_error() => {
            eprintln!(
                "\n{}",
                "Hint: A stack can only use values of stacks built before it in the same app."
                    .yellow()
            );
        }
        _ => {}
    }
}

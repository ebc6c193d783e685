//! CLI error types for structured error handling.
//!
//! Handlers return `anyhow::Result`; `main` looks for a [`CliError`] or a
//! core [`StatecryptError`] in the chain to pick the exit code and hint.

use std::fmt;

use statecrypt_core::StatecryptError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, root directory, archive)
    NotFound { message: String, hint: String },

    /// Invalid user input or configuration
    InvalidInput(String),

    /// `check` found unencrypted plaintexts
    CheckFailed(usize),

    /// Some artifacts in a batch failed or were declined
    BatchFailed { failed: usize, declined: usize },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::InvalidInput(message) => write!(f, "{}", message),
            CliError::CheckFailed(count) => {
                write!(f, "{} plaintext file(s) have no encrypted twin", count)
            }
            CliError::BatchFailed { failed, declined } => {
                write!(f, "{} failed, {} declined", failed, declined)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::CheckFailed(_) => exit_codes::CHECK_FAILED,
            CliError::BatchFailed { .. } => exit_codes::BATCH_FAILED,
        }
    }
}

/// Exit code for a core error that escaped a command.
pub fn core_exit_code(err: &StatecryptError) -> i32 {
    match err {
        StatecryptError::BackendNotFound(_)
        | StatecryptError::KeyStore(_)
        | StatecryptError::RandomSource(_) => exit_codes::FATAL,
        StatecryptError::IncorrectPassphrase | StatecryptError::MissingKey(_) => {
            exit_codes::AUTH_FAILED
        }
        StatecryptError::NotFound(_) => exit_codes::NOT_FOUND,
        StatecryptError::InvalidInput(_) => exit_codes::INVALID_INPUT,
        _ => 1,
    }
}

/// A follow-up suggestion for a core error, if one helps.
pub fn core_hint(err: &StatecryptError) -> Option<&'static str> {
    match err {
        StatecryptError::BackendNotFound(_) => {
            Some("Install the backend binary or set [backend] kind = \"age\" in the config.")
        }
        StatecryptError::KeyStore(_) => {
            Some("Run `statecrypt setup` or `statecrypt import-key` first.")
        }
        StatecryptError::IncorrectPassphrase => {
            Some("Check that the stored passphrase matches the one used by your team.")
        }
        StatecryptError::MissingKey(_) => {
            Some("Import the shared key with `statecrypt import-key <ARCHIVE>`.")
        }
        _ => None,
    }
}

/// Resolve the exit code and hint for any error chain.
pub fn classify(err: &anyhow::Error) -> (i32, Option<String>) {
    for cause in err.chain() {
        if let Some(cli) = cause.downcast_ref::<CliError>() {
            return (cli.exit_code(), None);
        }
        if let Some(core) = cause.downcast_ref::<StatecryptError>() {
            return (core_exit_code(core), core_hint(core).map(str::to_string));
        }
    }
    (1, None)
}

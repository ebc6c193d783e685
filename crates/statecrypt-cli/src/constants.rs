//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error, or a batch with failed or declined artifacts
/// - 2: Misuse of shell command (reserved by clap and shells)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Some artifact in the batch failed or was declined.
    pub const BATCH_FAILED: i32 = 1;

    /// Resource not found (config, artifact root, archive).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input, arguments, or configuration.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (wrong passphrase, missing private key).
    pub const AUTH_FAILED: i32 = 5;

    /// `check` found plaintexts without an encrypted twin.
    pub const CHECK_FAILED: i32 = 6;

    /// Backend binary or key store unusable; nothing was attempted.
    pub const FATAL: i32 = 7;
}

/// Environment variables read by the CLI.
pub mod env {
    pub const PASSPHRASE: &str = "STATECRYPT_PASSPHRASE";
    pub const LOG: &str = "STATECRYPT_LOG";
}

/// Directory name under the XDG config home.
pub const APP_DIR: &str = "statecrypt";

/// Config file name inside [`APP_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Key directory name inside [`APP_DIR`].
pub const KEYS_DIR: &str = "keys";

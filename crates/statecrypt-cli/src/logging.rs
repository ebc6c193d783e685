//! Diagnostic logging setup.
//!
//! Per-artifact results go to stdout through the UI layer; this is the
//! `tracing` stream on stderr for diagnosing backend and key handling.

use tracing_subscriber::EnvFilter;

use crate::constants::env;

/// Default filter for a `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `STATECRYPT_LOG` wins over `-v`.
pub fn init(verbosity: u8, color: bool) {
    let filter = EnvFilter::try_from_env(env::LOG)
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    // A second install (tests calling into main twice) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(false)
        .without_time()
        .try_init();
}

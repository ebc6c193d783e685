//! Application-level plumbing for the statecrypt CLI.
//!
//! This module provides:
//! - Config path resolution
//! - Effective settings (flags over config over defaults)
//! - A lazily-initialized context shared by command handlers
//! - Passphrase intake for key import

mod context;
mod passphrase;
mod resolver;
mod settings;

pub use context::AppContext;
pub use passphrase::read_shared_passphrase;

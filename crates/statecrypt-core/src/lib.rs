//! # Statecrypt Core
//!
//! Core library for Statecrypt - keeps secret artifacts (Terraform/OpenTofu
//! state files and similar) encrypted in a shared repository while
//! collaborators work on plaintext copies.
//!
//! This crate provides the sync workflow independent of the CLI interface.
//!
//! ## Architecture
//!
//! - **artifact**: Plaintext/ciphertext naming and discovery
//! - **conflict**: Timestamp-based staleness detection
//! - **backend**: Encryption backend trait with GPG and age implementations
//! - **keystore**: Passphrase and keypair lifecycle under a logical key id
//! - **orchestrator**: Batch encrypt/decrypt, cleanup and check
//! - **provider**: OpenTofu external key provider protocol

pub mod artifact;
pub mod backend;
pub mod confirm;
pub mod conflict;
pub mod error;
pub mod fs;
pub mod keystore;
pub mod orchestrator;
pub mod provider;

pub use artifact::{ArtifactLayout, ArtifactPair};
pub use backend::{AgeBackend, Backend, CryptRequest, GpgBackend, KeyMode};
pub use confirm::{AlwaysConfirm, Confirmer, NeverConfirm};
pub use conflict::{Assessment, Direction};
pub use error::{Result, StatecryptError};
pub use keystore::KeyStore;
pub use orchestrator::{ArtifactResult, BatchReport, CheckReport, Orchestrator, Outcome};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

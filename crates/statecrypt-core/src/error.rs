//! Error types for statecrypt core operations.
//!
//! Errors fall into two groups. Fatal errors (missing backend binary,
//! unusable key store, no secure random source) abort a whole run.
//! Everything else is scoped to a single artifact: the orchestrator records
//! it in the batch report and moves on to the next file.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for statecrypt operations.
pub type Result<T> = std::result::Result<T, StatecryptError>;

/// Core error type for statecrypt operations.
#[derive(Debug, Error)]
pub enum StatecryptError {
    /// The encryption backend binary could not be executed
    #[error("Required binary not found: {0}")]
    BackendNotFound(String),

    /// Key material is missing, unreadable, or could not be created
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// The operating system refused to hand out random bytes
    #[error("Secure random source unavailable: {0}")]
    RandomSource(String),

    /// Incorrect passphrase during decryption
    #[error("Incorrect passphrase")]
    IncorrectPassphrase,

    /// The local keyring does not hold the private key for a ciphertext
    #[error("Missing private key: {0}")]
    MissingKey(String),

    /// Ciphertext could not be parsed or failed authentication
    #[error("Corrupted ciphertext: {0}")]
    CorruptCiphertext(String),

    /// Any other encryption backend failure
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Source file has zero bytes
    #[error("Empty source file: {}", .0.display())]
    EmptySource(PathBuf),

    /// User declined an overwrite
    #[error("Overwrite declined: {}", .0.display())]
    Declined(PathBuf),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl StatecryptError {
    /// Whether this error must abort the whole run instead of a single artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StatecryptError::BackendNotFound(_)
                | StatecryptError::KeyStore(_)
                | StatecryptError::RandomSource(_)
        )
    }
}

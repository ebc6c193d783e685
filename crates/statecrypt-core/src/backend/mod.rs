//! Encryption backend abstraction.
//!
//! A backend turns one file into another (plaintext into ciphertext or back)
//! and owns whatever keypair lives under the logical key identifier.
//! Orchestration never talks to a concrete tool directly, so GPG and age are
//! interchangeable.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatecryptError};

mod gpg;
mod native;

pub use self::native::AgeBackend;
pub use self::gpg::{GpgBackend, PassphraseFile};

/// How artifacts are encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Passphrase only.
    #[default]
    Symmetric,
    /// Dedicated keypair named by the logical key id, unlocked by the passphrase.
    Asymmetric,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Symmetric => write!(f, "symmetric"),
            KeyMode::Asymmetric => write!(f, "asymmetric"),
        }
    }
}

impl FromStr for KeyMode {
    type Err = StatecryptError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "symmetric" | "sym" => Ok(KeyMode::Symmetric),
            "asymmetric" | "asym" => Ok(KeyMode::Asymmetric),
            other => Err(StatecryptError::InvalidInput(format!(
                "Unknown key mode '{}' (expected symmetric or asymmetric)",
                other
            ))),
        }
    }
}

/// One file transformation.
pub struct CryptRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub key_id: &'a str,
    pub mode: KeyMode,
    pub passphrase: &'a SecretString,
}

impl fmt::Debug for CryptRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptRequest")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("key_id", &self.key_id)
            .field("mode", &self.mode)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// Encryption tool adapter.
///
/// Implementations write outputs through a sibling temp file and rename it
/// into place, so a failed call never leaves a truncated target behind.
pub trait Backend {
    /// Short backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Ciphertext suffix used when none is configured.
    fn default_suffix(&self) -> &'static str;

    /// Verify the backend is usable; returns a version string.
    ///
    /// # Errors
    ///
    /// `BackendNotFound` when the underlying binary cannot be executed.
    fn probe(&self) -> Result<String>;

    fn encrypt(&self, request: &CryptRequest<'_>) -> Result<()>;

    fn decrypt(&self, request: &CryptRequest<'_>) -> Result<()>;

    /// Fail fast with `MissingKey` when `ciphertext` is addressed to a private
    /// key this machine does not hold. Passphrase-only ciphertexts pass.
    fn ensure_decryption_key(&self, ciphertext: &Path, key_id: &str) -> Result<()>;

    /// Whether a keypair named `key_id` is available locally.
    fn has_key(&self, key_id: &str) -> Result<bool>;

    fn generate_key(&self, key_id: &str, passphrase: &SecretString) -> Result<()>;

    /// Write the private key, protected by `passphrase`, to `dest`.
    fn export_key(&self, key_id: &str, passphrase: &SecretString, dest: &Path) -> Result<()>;

    /// Install the private key from a portable archive.
    fn import_key(&self, key_id: &str, archive: &Path, passphrase: &SecretString) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mode_parsing() {
        assert_eq!("symmetric".parse::<KeyMode>().unwrap(), KeyMode::Symmetric);
        assert_eq!(" Asymmetric ".parse::<KeyMode>().unwrap(), KeyMode::Asymmetric);
        assert!(matches!(
            "rot13".parse::<KeyMode>(),
            Err(StatecryptError::InvalidInput(_))
        ));
        assert_eq!(KeyMode::default(), KeyMode::Symmetric);
        assert_eq!(KeyMode::Asymmetric.to_string(), "asymmetric");
    }

    #[test]
    fn test_request_debug_redacts_passphrase() {
        let passphrase = SecretString::from("do-not-print-me".to_string());
        let request = CryptRequest {
            input: Path::new("prod.tfstate"),
            output: Path::new("prod.tfstate.gpg"),
            key_id: "statecrypt",
            mode: KeyMode::Symmetric,
            passphrase: &passphrase,
        };
        let debug = format!("{:?}", request);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("do-not-print-me"));
    }
}

//! On-disk key material under a logical key identifier.
//!
//! The passphrase lives at `<dir>/<key_id>.passphrase` (owner-only). In
//! asymmetric mode the backend additionally holds a keypair named by the same
//! identifier. Creating new material is rare and always confirmed, because a
//! fresh key silently orphans every ciphertext made with the old one.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::unsync::OnceCell;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::backend::{Backend, KeyMode};
use crate::confirm::Confirmer;
use crate::error::{Result, StatecryptError};
use crate::fs::create_private_file;

/// Random bytes behind a generated passphrase.
pub const PASSPHRASE_BYTES: usize = 32;

/// Minimum length for imported passphrases.
pub const MIN_PASSPHRASE_LENGTH: usize = 8;

const PASSPHRASE_EXTENSION: &str = "passphrase";

/// Key material for one logical key identifier.
pub struct KeyStore {
    dir: PathBuf,
    key_id: String,
    cached: OnceCell<SecretString>,
}

/// What `setup` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    pub backend_version: String,
    pub passphrase_created: bool,
    pub keypair_generated: bool,
}

/// What `import_key` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub passphrase_written: bool,
    pub keypair_imported: bool,
}

impl KeyStore {
    /// # Errors
    ///
    /// `InvalidInput` if `key_id` is empty or contains path separators.
    pub fn new(dir: impl Into<PathBuf>, key_id: impl Into<String>) -> Result<Self> {
        let key_id = key_id.into();
        validate_key_id(&key_id)?;
        Ok(Self {
            dir: dir.into(),
            key_id,
            cached: OnceCell::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn passphrase_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.key_id, PASSPHRASE_EXTENSION))
    }

    pub fn has_passphrase(&self) -> bool {
        self.passphrase_path().is_file()
    }

    /// The stored passphrase, read from disk at most once.
    ///
    /// # Errors
    ///
    /// Fatal `KeyStore` error when the file is missing, unreadable, or empty.
    pub fn passphrase(&self) -> Result<&SecretString> {
        self.cached.get_or_try_init(|| self.load_passphrase())
    }

    /// Return the stored passphrase, creating one after confirmation.
    ///
    /// The boolean is `true` when new material was generated.
    pub fn get_or_create_passphrase(
        &self,
        confirmer: &mut dyn Confirmer,
    ) -> Result<(&SecretString, bool)> {
        let path = self.passphrase_path();
        if path.exists() {
            return Ok((self.passphrase()?, false));
        }

        let prompt = format!(
            "No key material for '{}'. Create a NEW passphrase? Ciphertexts made with another key will stay unreadable.",
            self.key_id
        );
        if !confirmer.confirm(&prompt)? {
            return Err(StatecryptError::KeyStore(format!(
                "Creation of key '{}' declined; import the shared key with `import-key` instead",
                self.key_id
            )));
        }

        let encoded = generate_passphrase()?;
        create_private_file(&path, encoded.as_bytes()).map_err(|e| {
            StatecryptError::KeyStore(format!("Cannot write {}: {}", path.display(), e))
        })?;
        tracing::info!(key_id = %self.key_id, path = %path.display(), "Created passphrase");

        Ok((self.passphrase()?, true))
    }

    /// Write the passphrase-protected private key to `dest`.
    pub fn export_key(&self, backend: &dyn Backend, mode: KeyMode, dest: &Path) -> Result<()> {
        if mode == KeyMode::Symmetric {
            return Err(StatecryptError::InvalidInput(
                "Symmetric mode has no keypair to export; transfer the passphrase file securely instead"
                    .to_string(),
            ));
        }
        if dest.exists() {
            return Err(StatecryptError::InvalidInput(format!(
                "Refusing to overwrite existing file {}",
                dest.display()
            )));
        }
        let passphrase = self.passphrase()?;
        backend.export_key(&self.key_id, passphrase, dest)?;
        tracing::info!(key_id = %self.key_id, dest = %dest.display(), "Exported key");
        Ok(())
    }

    /// Install a transferred passphrase and, when given, the portable key archive.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a weak passphrase, a missing archive in asymmetric
    ///   mode, or a stored passphrase that differs from `passphrase`
    /// - Backend errors when the archive cannot be unlocked
    pub fn import_key(
        &self,
        backend: &dyn Backend,
        mode: KeyMode,
        archive: Option<&Path>,
        passphrase: SecretString,
    ) -> Result<ImportReport> {
        validate_passphrase(passphrase.expose_secret())?;

        let existing = if self.has_passphrase() {
            Some(self.passphrase()?)
        } else {
            None
        };
        if let Some(existing) = existing {
            if existing.expose_secret() != passphrase.expose_secret() {
                return Err(StatecryptError::InvalidInput(format!(
                    "A different passphrase is already stored at {}; refusing to replace it",
                    self.passphrase_path().display()
                )));
            }
        }

        if mode == KeyMode::Asymmetric && archive.is_none() {
            return Err(StatecryptError::InvalidInput(
                "Asymmetric mode needs the exported key archive".to_string(),
            ));
        }

        // Import first so a passphrase that cannot unlock the archive is never stored.
        let keypair_imported = match archive {
            Some(archive) => {
                backend.import_key(&self.key_id, archive, &passphrase)?;
                true
            }
            None => false,
        };

        let passphrase_written = existing.is_none();
        if passphrase_written {
            let path = self.passphrase_path();
            create_private_file(&path, passphrase.expose_secret().as_bytes()).map_err(|e| {
                StatecryptError::KeyStore(format!("Cannot write {}: {}", path.display(), e))
            })?;
            tracing::info!(key_id = %self.key_id, "Imported passphrase");
        }

        Ok(ImportReport {
            passphrase_written,
            keypair_imported,
        })
    }

    /// One-time bootstrap: probe the backend, then create or confirm key material.
    pub fn setup(
        &self,
        backend: &dyn Backend,
        mode: KeyMode,
        confirmer: &mut dyn Confirmer,
    ) -> Result<SetupReport> {
        let backend_version = backend.probe()?;
        let (passphrase, passphrase_created) = self.get_or_create_passphrase(confirmer)?;

        let mut keypair_generated = false;
        if mode == KeyMode::Asymmetric && !backend.has_key(&self.key_id)? {
            let prompt = format!(
                "Generate a NEW {} keypair '{}'? Collaborators will need the exported key.",
                backend.name(),
                self.key_id
            );
            if !confirmer.confirm(&prompt)? {
                return Err(StatecryptError::KeyStore(format!(
                    "Keypair creation for '{}' declined; import it with `import-key` instead",
                    self.key_id
                )));
            }
            backend.generate_key(&self.key_id, passphrase)?;
            keypair_generated = true;
        }

        Ok(SetupReport {
            backend_version,
            passphrase_created,
            keypair_generated,
        })
    }

    fn load_passphrase(&self) -> Result<SecretString> {
        let path = self.passphrase_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => Zeroizing::new(contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StatecryptError::KeyStore(format!(
                    "No passphrase for key '{}' at {}; run `statecrypt setup` or `statecrypt import-key`",
                    self.key_id,
                    path.display()
                )))
            }
            Err(err) => {
                return Err(StatecryptError::KeyStore(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    err
                )))
            }
        };

        warn_if_shared(&path);

        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Err(StatecryptError::KeyStore(format!(
                "Passphrase file {} is empty",
                path.display()
            )));
        }
        Ok(SecretString::from(trimmed.to_owned()))
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("dir", &self.dir)
            .field("key_id", &self.key_id)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// 32 random bytes, base64-encoded.
///
/// # Errors
///
/// Fatal `RandomSource` when the OS cannot supply randomness.
pub fn generate_passphrase() -> Result<Zeroizing<String>> {
    let mut bytes = Zeroizing::new([0u8; PASSPHRASE_BYTES]);
    getrandom::getrandom(bytes.as_mut_slice())
        .map_err(|e| StatecryptError::RandomSource(e.to_string()))?;
    Ok(Zeroizing::new(STANDARD.encode(bytes.as_slice())))
}

/// Validate a passphrase supplied by a user.
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.trim().is_empty() {
        return Err(StatecryptError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(StatecryptError::InvalidInput(format!(
            "Passphrase must be at least {} characters (got {})",
            MIN_PASSPHRASE_LENGTH,
            passphrase.len()
        )));
    }

    Ok(())
}

/// Logical key ids become file names and gpg user ids.
pub fn validate_key_id(key_id: &str) -> Result<()> {
    if key_id.is_empty() {
        return Err(StatecryptError::InvalidInput(
            "Key id cannot be empty".to_string(),
        ));
    }
    if key_id.starts_with('.')
        || !key_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
    {
        return Err(StatecryptError::InvalidInput(format!(
            "Invalid key id '{}': use letters, digits, '-', '_', '.', '@'",
            key_id
        )));
    }
    Ok(())
}

fn warn_if_shared(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            let mode = meta.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                tracing::warn!(path = %path.display(), mode = format!("{:o}", mode), "Passphrase file is accessible to other users");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

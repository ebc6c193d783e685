//! Native age backend.
//!
//! Symmetric mode encrypts with an scrypt passphrase recipient. Asymmetric
//! mode keeps an X25519 identity in the key directory, itself age-encrypted
//! with the passphrase, next to its public recipient:
//!
//! ```text
//! <key_dir>/<key_id>.age-identity   (0600, passphrase-protected)
//! <key_dir>/<key_id>.age-recipient  (age1...)
//! ```

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::iter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use super::{Backend, CryptRequest, KeyMode};
use crate::error::{Result, StatecryptError};
use crate::fs::{write_private_file, StagedFile};

const IDENTITY_EXTENSION: &str = "age-identity";
const RECIPIENT_EXTENSION: &str = "age-recipient";

/// Encrypts with the `age` crate; no external binary required.
#[derive(Debug, Clone)]
pub struct AgeBackend {
    key_dir: PathBuf,
    scrypt_work_factor: Option<u8>,
}

impl AgeBackend {
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
            scrypt_work_factor: None,
        }
    }

    /// Pin the scrypt work factor (log2 N) instead of age's calibrated default.
    pub fn with_scrypt_work_factor(mut self, log_n: u8) -> Self {
        self.scrypt_work_factor = Some(log_n);
        self
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    pub fn identity_path(&self, key_id: &str) -> PathBuf {
        self.key_dir.join(format!("{}.{}", key_id, IDENTITY_EXTENSION))
    }

    pub fn recipient_path(&self, key_id: &str) -> PathBuf {
        self.key_dir.join(format!("{}.{}", key_id, RECIPIENT_EXTENSION))
    }

    fn passphrase_encryptor(&self, passphrase: &SecretString) -> Result<age::Encryptor> {
        let secret = age::secrecy::SecretString::from(passphrase.expose_secret().to_owned());
        match self.scrypt_work_factor {
            None => Ok(age::Encryptor::with_user_passphrase(secret)),
            Some(log_n) => {
                let mut recipient = age::scrypt::Recipient::new(secret);
                recipient.set_work_factor(log_n);
                age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
                    .map_err(|e| StatecryptError::Crypto(format!("Failed to create encryptor: {}", e)))
            }
        }
    }

    fn recipient_encryptor(&self, key_id: &str) -> Result<age::Encryptor> {
        let path = self.recipient_path(key_id);
        let encoded = match fs::read_to_string(&path) {
            Ok(encoded) => encoded,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StatecryptError::MissingKey(key_id.to_owned()))
            }
            Err(err) => return Err(err.into()),
        };
        let recipient = age::x25519::Recipient::from_str(encoded.trim()).map_err(|e| {
            StatecryptError::KeyStore(format!("{}: invalid recipient: {}", path.display(), e))
        })?;
        age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
            .map_err(|e| StatecryptError::Crypto(format!("Failed to create encryptor: {}", e)))
    }

    /// Decrypt an identity archive with the passphrase.
    fn unlock_identity(&self, archive: &[u8], passphrase: &SecretString) -> Result<age::x25519::Identity> {
        let decryptor = age::Decryptor::new(archive)
            .map_err(|e| StatecryptError::KeyStore(format!("Unreadable key archive: {}", e)))?;
        let identity = scrypt_identity(passphrase);
        let mut reader = decryptor
            .decrypt(iter::once(&identity as &dyn age::Identity))
            .map_err(map_passphrase_error)?;

        let mut encoded = zeroize::Zeroizing::new(String::new());
        reader
            .read_to_string(&mut encoded)
            .map_err(|e| StatecryptError::KeyStore(format!("Unreadable key archive: {}", e)))?;
        age::x25519::Identity::from_str(encoded.trim())
            .map_err(|e| StatecryptError::KeyStore(format!("Invalid identity: {}", e)))
    }

    fn load_identity(&self, key_id: &str, passphrase: &SecretString) -> Result<age::x25519::Identity> {
        let path = self.identity_path(key_id);
        let archive = match fs::read(&path) {
            Ok(archive) => archive,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StatecryptError::MissingKey(key_id.to_owned()))
            }
            Err(err) => return Err(err.into()),
        };
        self.unlock_identity(&archive, passphrase)
    }

    fn install_identity(
        &self,
        key_id: &str,
        identity: &age::x25519::Identity,
        passphrase: &SecretString,
    ) -> Result<()> {
        let encoded = identity.to_string();
        let mut archive = Vec::new();
        let mut writer = self
            .passphrase_encryptor(passphrase)?
            .wrap_output(&mut archive)
            .map_err(|e| StatecryptError::Crypto(format!("Failed to create encryptor: {}", e)))?;
        writer
            .write_all(encoded.expose_secret().as_bytes())
            .map_err(|e| StatecryptError::Crypto(format!("Encryption write failed: {}", e)))?;
        writer
            .finish()
            .map_err(|e| StatecryptError::Crypto(format!("Encryption finish failed: {}", e)))?;

        write_private_file(&self.identity_path(key_id), &archive)?;
        write_private_file(
            &self.recipient_path(key_id),
            format!("{}\n", identity.to_public()).as_bytes(),
        )?;
        Ok(())
    }
}

impl Backend for AgeBackend {
    fn name(&self) -> &'static str {
        "age"
    }

    fn default_suffix(&self) -> &'static str {
        "age"
    }

    fn probe(&self) -> Result<String> {
        Ok("age (rust crate)".to_owned())
    }

    fn encrypt(&self, request: &CryptRequest<'_>) -> Result<()> {
        let encryptor = match request.mode {
            KeyMode::Symmetric => self.passphrase_encryptor(request.passphrase)?,
            KeyMode::Asymmetric => self.recipient_encryptor(request.key_id)?,
        };

        let mut input = BufReader::new(File::open(request.input)?);
        let staged = StagedFile::new(request.output)?;
        let output = File::create(staged.path())?;

        let mut writer = encryptor
            .wrap_output(output)
            .map_err(|e| StatecryptError::Crypto(format!("Failed to create encryptor: {}", e)))?;
        io::copy(&mut input, &mut writer)
            .map_err(|e| StatecryptError::Crypto(format!("Encryption write failed: {}", e)))?;
        let output = writer
            .finish()
            .map_err(|e| StatecryptError::Crypto(format!("Encryption finish failed: {}", e)))?;
        output.sync_all()?;

        staged.commit()?;
        Ok(())
    }

    fn decrypt(&self, request: &CryptRequest<'_>) -> Result<()> {
        let input = BufReader::new(File::open(request.input)?);
        let decryptor = age::Decryptor::new(input).map_err(map_header_error)?;

        let staged = StagedFile::new(request.output)?;
        let mut output = File::create(staged.path())?;

        if decryptor.is_scrypt() {
            let identity = scrypt_identity(request.passphrase);
            let mut reader = decryptor
                .decrypt(iter::once(&identity as &dyn age::Identity))
                .map_err(map_passphrase_error)?;
            copy_payload(&mut reader, &mut output)?;
        } else {
            let identity = self.load_identity(request.key_id, request.passphrase)?;
            let mut reader = decryptor
                .decrypt(iter::once(&identity as &dyn age::Identity))
                .map_err(|e| match e {
                    age::DecryptError::NoMatchingKeys => {
                        StatecryptError::MissingKey(request.key_id.to_owned())
                    }
                    other => map_payload_error(other),
                })?;
            copy_payload(&mut reader, &mut output)?;
        }
        output.sync_all()?;
        drop(output);

        staged.commit()?;
        Ok(())
    }

    fn ensure_decryption_key(&self, ciphertext: &Path, key_id: &str) -> Result<()> {
        let input = BufReader::new(File::open(ciphertext)?);
        let decryptor = age::Decryptor::new(input).map_err(map_header_error)?;
        if decryptor.is_scrypt() || self.identity_path(key_id).is_file() {
            return Ok(());
        }
        Err(StatecryptError::MissingKey(key_id.to_owned()))
    }

    fn has_key(&self, key_id: &str) -> Result<bool> {
        Ok(self.identity_path(key_id).is_file())
    }

    fn generate_key(&self, key_id: &str, passphrase: &SecretString) -> Result<()> {
        if self.has_key(key_id)? {
            return Err(StatecryptError::InvalidInput(format!(
                "Key '{}' already exists in {}",
                key_id,
                self.key_dir.display()
            )));
        }
        let identity = age::x25519::Identity::generate();
        self.install_identity(key_id, &identity, passphrase)?;
        tracing::info!(key_id, "Generated age identity");
        Ok(())
    }

    fn export_key(&self, key_id: &str, passphrase: &SecretString, dest: &Path) -> Result<()> {
        let archive = match fs::read(self.identity_path(key_id)) {
            Ok(archive) => archive,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StatecryptError::MissingKey(key_id.to_owned()))
            }
            Err(err) => return Err(err.into()),
        };
        // Refuse to hand out an archive the passphrase cannot open.
        self.unlock_identity(&archive, passphrase)?;
        write_private_file(dest, &archive)?;
        Ok(())
    }

    fn import_key(&self, key_id: &str, archive: &Path, passphrase: &SecretString) -> Result<()> {
        let bytes = fs::read(archive)?;
        let identity = self.unlock_identity(&bytes, passphrase)?;
        self.install_identity(key_id, &identity, passphrase)?;
        tracing::info!(key_id, "Imported age identity");
        Ok(())
    }
}

fn scrypt_identity(passphrase: &SecretString) -> age::scrypt::Identity {
    age::scrypt::Identity::new(age::secrecy::SecretString::from(
        passphrase.expose_secret().to_owned(),
    ))
}

fn copy_payload(reader: &mut impl Read, output: &mut File) -> Result<()> {
    io::copy(reader, output)
        .map(|_| ())
        .map_err(|e| StatecryptError::CorruptCiphertext(format!("Payload unreadable: {}", e)))
}

fn map_header_error(e: age::DecryptError) -> StatecryptError {
    match e {
        age::DecryptError::Io(err) if err.kind() != io::ErrorKind::UnexpectedEof => {
            StatecryptError::Io { source: err }
        }
        other => StatecryptError::CorruptCiphertext(other.to_string()),
    }
}

fn map_passphrase_error(e: age::DecryptError) -> StatecryptError {
    match e {
        age::DecryptError::NoMatchingKeys
        | age::DecryptError::DecryptionFailed
        | age::DecryptError::KeyDecryptionFailed => StatecryptError::IncorrectPassphrase,
        other => map_payload_error(other),
    }
}

fn map_payload_error(e: age::DecryptError) -> StatecryptError {
    match e {
        age::DecryptError::InvalidHeader
        | age::DecryptError::InvalidMac
        | age::DecryptError::UnknownFormat => StatecryptError::CorruptCiphertext(e.to_string()),
        other => StatecryptError::Crypto(format!("Decryption failed: {}", other)),
    }
}

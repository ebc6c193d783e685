use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
    process::{Command, Output},
    thread,
    time::Duration,
};

use secrecy::{ExposeSecret, SecretString};

use super::{Backend, CryptRequest, KeyMode};
use crate::error::{Result, StatecryptError};
use crate::fs::{secure_erase, set_private_permissions, StagedFile};

const EXEC_BUSY_RETRY_ATTEMPTS: usize = 20;
const EXEC_BUSY_RETRY_DELAY: Duration = Duration::from_millis(10);
const ETXTBSY: i32 = 26;

/// Drives the system `gpg` binary.
#[derive(Debug, Clone)]
pub struct GpgBackend {
    binary: String,
    homedir: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
}

impl GpgBackend {
    /// Constructs a backend using `gpg` from `PATH`.
    pub fn new() -> Self {
        Self::with_binary("gpg")
    }

    /// Constructs a backend with a custom binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            homedir: None,
            scratch_dir: None,
        }
    }

    /// Use a dedicated GnuPG home directory instead of the user's keyring.
    pub fn with_homedir(mut self, homedir: impl Into<PathBuf>) -> Self {
        self.homedir = Some(homedir.into());
        self
    }

    /// Directory for transient passphrase files (system temp dir by default).
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn base_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(homedir) = &self.homedir {
            args.push("--homedir".into());
            args.push(homedir.into());
        }
        for arg in ["--batch", "--yes", "--quiet", "--pinentry-mode", "loopback"] {
            args.push(arg.into());
        }
        args
    }

    fn passphrase_file(&self, passphrase: &SecretString) -> Result<PassphraseFile> {
        let dir = self
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        PassphraseFile::create_in(&dir, passphrase)
    }

    fn run(&self, args: &[OsString]) -> Result<Output> {
        let mut full_args = self.base_args();
        full_args.extend(args.iter().cloned());
        tracing::debug!(binary = %self.binary, args = ?full_args, "Invoking gpg");

        retry_exec_busy(|| Command::new(&self.binary).args(&full_args).output())
            .map_err(|error| map_command_execution_error(&self.binary, error))
    }

    fn run_checked(&self, args: &[OsString], key_id: &str) -> Result<Output> {
        let output = self.run(args)?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(&stderr, key_id))
    }

    fn has_secret_key(&self, key: &str) -> Result<bool> {
        let output = self.run(&args(["--with-colons", "--list-secret-keys", key]))?;
        Ok(output.status.success())
    }
}

impl Default for GpgBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for GpgBackend {
    fn name(&self) -> &'static str {
        "gpg"
    }

    fn default_suffix(&self) -> &'static str {
        "gpg"
    }

    fn probe(&self) -> Result<String> {
        let output = retry_exec_busy(|| Command::new(&self.binary).arg("--version").output())
            .map_err(|error| map_command_execution_error(&self.binary, error))?;
        if !output.status.success() {
            return Err(StatecryptError::BackendNotFound(format!(
                "{} (--version exited with {})",
                self.binary, output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_owned())
    }

    fn encrypt(&self, request: &CryptRequest<'_>) -> Result<()> {
        let staged = StagedFile::new(request.output)?;
        let passphrase_file = match request.mode {
            KeyMode::Symmetric => Some(self.passphrase_file(request.passphrase)?),
            KeyMode::Asymmetric => None,
        };

        let mut op: Vec<OsString> = Vec::new();
        if let Some(file) = &passphrase_file {
            op.push("--passphrase-file".into());
            op.push(file.path().into());
        }
        match request.mode {
            KeyMode::Symmetric => op.extend(args(["--symmetric", "--cipher-algo", "AES256"])),
            KeyMode::Asymmetric => op.extend(args([
                "--trust-model",
                "always",
                "--recipient",
                request.key_id,
                "--encrypt",
            ])),
        }
        op.push("--output".into());
        op.push(staged.path().into());
        op.push(request.input.into());

        self.run_checked(&op, request.key_id)?;
        drop(passphrase_file);
        set_private_permissions(staged.path())?;
        staged.commit()?;
        Ok(())
    }

    fn decrypt(&self, request: &CryptRequest<'_>) -> Result<()> {
        let staged = StagedFile::new(request.output)?;
        let passphrase_file = self.passphrase_file(request.passphrase)?;

        let mut op: Vec<OsString> = vec!["--passphrase-file".into(), passphrase_file.path().into()];
        op.push("--decrypt".into());
        op.push("--output".into());
        op.push(staged.path().into());
        op.push(request.input.into());

        self.run_checked(&op, request.key_id)?;
        drop(passphrase_file);
        set_private_permissions(staged.path())?;
        staged.commit()?;
        Ok(())
    }

    fn ensure_decryption_key(&self, ciphertext: &Path, key_id: &str) -> Result<()> {
        let mut op = args(["--list-only", "--list-packets"]);
        op.push(ciphertext.into());
        let output = self.run(&op)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let recipients = recipient_key_ids(&stdout);
        if recipients.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if let failure @ StatecryptError::CorruptCiphertext(_) =
                classify_failure(&stderr, key_id)
            {
                return Err(failure);
            }
            // Passphrase-only packet.
            return Ok(());
        }

        // Hidden recipients cannot be checked up front.
        if recipients.iter().any(|id| id.chars().all(|c| c == '0')) {
            return Ok(());
        }
        for recipient in &recipients {
            if self.has_secret_key(recipient)? {
                return Ok(());
            }
        }
        Err(StatecryptError::MissingKey(recipients.join(", ")))
    }

    fn has_key(&self, key_id: &str) -> Result<bool> {
        self.has_secret_key(key_id)
    }

    fn generate_key(&self, key_id: &str, passphrase: &SecretString) -> Result<()> {
        let passphrase_file = self.passphrase_file(passphrase)?;
        let mut op: Vec<OsString> = vec!["--passphrase-file".into(), passphrase_file.path().into()];
        op.extend(args([
            "--quick-generate-key",
            key_id,
            "default",
            "default",
            "never",
        ]));
        self.run_checked(&op, key_id)?;
        Ok(())
    }

    fn export_key(&self, key_id: &str, passphrase: &SecretString, dest: &Path) -> Result<()> {
        let staged = StagedFile::new(dest)?;
        let passphrase_file = self.passphrase_file(passphrase)?;
        let mut op: Vec<OsString> = vec!["--passphrase-file".into(), passphrase_file.path().into()];
        op.extend(args(["--armor", "--output"]));
        op.push(staged.path().into());
        op.extend(args(["--export-secret-keys", key_id]));

        self.run_checked(&op, key_id)?;
        drop(passphrase_file);

        if fs::metadata(staged.path())?.len() == 0 {
            return Err(StatecryptError::MissingKey(key_id.to_owned()));
        }
        set_private_permissions(staged.path())?;
        staged.commit()?;
        Ok(())
    }

    fn import_key(&self, key_id: &str, archive: &Path, passphrase: &SecretString) -> Result<()> {
        let passphrase_file = self.passphrase_file(passphrase)?;
        let mut op: Vec<OsString> = vec!["--passphrase-file".into(), passphrase_file.path().into()];
        op.push("--import".into());
        op.push(archive.into());

        self.run_checked(&op, key_id)?;
        drop(passphrase_file);

        if !self.has_secret_key(key_id)? {
            return Err(StatecryptError::MissingKey(format!(
                "{} (archive did not contain it)",
                key_id
            )));
        }
        Ok(())
    }
}

/// A passphrase on disk for exactly as long as one gpg call needs it.
///
/// Created owner-only, handed to gpg via `--passphrase-file`, and
/// overwritten then deleted when dropped.
#[derive(Debug)]
pub struct PassphraseFile {
    path: PathBuf,
}

impl PassphraseFile {
    pub fn create_in(dir: &Path, passphrase: &SecretString) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let (_file, path) = tempfile::Builder::new()
            .prefix("statecrypt-pass-")
            .tempfile_in(dir)?
            .keep()
            .map_err(|err| StatecryptError::Io { source: err.error })?;
        let guard = Self { path };
        set_private_permissions(&guard.path)?;
        fs::write(&guard.path, passphrase.expose_secret().as_bytes())?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PassphraseFile {
    fn drop(&mut self) {
        if let Err(error) = secure_erase(&self.path) {
            tracing::warn!(path = %self.path.display(), %error, "Failed to erase passphrase file");
        }
    }
}

fn args<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<OsString> {
    items.into_iter().map(OsString::from).collect()
}

/// Map gpg's stderr onto the error taxonomy.
fn classify_failure(stderr: &str, key_id: &str) -> StatecryptError {
    let lowered = stderr.to_lowercase();
    let detail = stderr.trim().to_owned();

    if lowered.contains("bad passphrase") || lowered.contains("bad session key") {
        return StatecryptError::IncorrectPassphrase;
    }
    if lowered.contains("no secret key") {
        return StatecryptError::MissingKey(key_id.to_owned());
    }
    if ["no valid openpgp data", "invalid packet", "unexpected", "crc error"]
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return StatecryptError::CorruptCiphertext(detail);
    }
    StatecryptError::Crypto(format!("gpg failed: {}", detail))
}

/// Key ids from `:pubkey enc packet: ... keyid XXXX` lines.
fn recipient_key_ids(list_packets: &str) -> Vec<String> {
    list_packets
        .lines()
        .filter(|line| line.contains(":pubkey enc packet:"))
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            words.find(|word| *word == "keyid")?;
            words.next().map(|id| id.trim_end_matches(',').to_owned())
        })
        .collect()
}

fn map_command_execution_error(binary: &str, error: io::Error) -> StatecryptError {
    if error.kind() == io::ErrorKind::NotFound {
        return StatecryptError::BackendNotFound(binary.to_owned());
    }
    StatecryptError::Io { source: error }
}

fn retry_exec_busy<T, F>(mut operation: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let mut last_error = None;
    for attempt in 0..EXEC_BUSY_RETRY_ATTEMPTS {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) if is_exec_busy_error(&error) && attempt + 1 < EXEC_BUSY_RETRY_ATTEMPTS => {
                last_error = Some(error);
                thread::sleep(EXEC_BUSY_RETRY_DELAY);
            }
            Err(error) => return Err(error),
        }
    }

    Err(last_error.unwrap_or_else(|| io::Error::other("command execution failed")))
}

fn is_exec_busy_error(error: &io::Error) -> bool {
    error.raw_os_error() == Some(ETXTBSY)
}

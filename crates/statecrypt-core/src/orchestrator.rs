//! Batch operations over every artifact under a root.
//!
//! Each artifact is handled on its own: a per-file failure is recorded in
//! the report and the batch continues. Only fatal errors (see
//! [`StatecryptError::is_fatal`]) abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifact::{conflict_side_path, ArtifactLayout, ArtifactPair};
use crate::backend::{Backend, CryptRequest, KeyMode};
use crate::confirm::Confirmer;
use crate::conflict::{self, Assessment, Direction, Timestamps};
use crate::error::{Result, StatecryptError};
use crate::fs::{secure_erase, sync_mtime, StagedFile};
use crate::keystore::KeyStore;

/// Result of one artifact in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Encrypted,
    Decrypted,
    /// Content digests matched; nothing written.
    Unchanged,
    /// Plaintext erased by cleanup.
    Removed,
    Skipped { reason: String },
    /// Plaintext was newer; decrypted content went to a side file.
    Conflicted { side_file: PathBuf },
    /// The user refused to overwrite a newer ciphertext.
    Declined,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactResult {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub encrypted: usize,
    pub decrypted: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub skipped: usize,
    pub conflicted: usize,
    pub declined: usize,
    pub failed: usize,
}

/// Per-file results plus aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<ArtifactResult>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn push(&mut self, path: PathBuf, outcome: Outcome) {
        let counter = match &outcome {
            Outcome::Encrypted => &mut self.summary.encrypted,
            Outcome::Decrypted => &mut self.summary.decrypted,
            Outcome::Unchanged => &mut self.summary.unchanged,
            Outcome::Removed => &mut self.summary.removed,
            Outcome::Skipped { .. } => &mut self.summary.skipped,
            Outcome::Conflicted { .. } => &mut self.summary.conflicted,
            Outcome::Declined => &mut self.summary.declined,
            Outcome::Failed { .. } => &mut self.summary.failed,
        };
        *counter += 1;
        self.results.push(ArtifactResult { path, outcome });
    }

    /// Failed artifacts and unresolved conflicts make the batch unsuccessful.
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0 || self.summary.declined > 0
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Pre-publish gate: plaintexts without a ciphertext twin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub missing: Vec<PathBuf>,
    pub covered: Vec<PathBuf>,
    /// Covered, but the plaintext changed after the last encryption.
    pub stale: Vec<PathBuf>,
    /// Zero-byte plaintexts, which are never encrypted.
    pub empty: Vec<PathBuf>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Relationship between the two sides of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    PlaintextOnly,
    CiphertextOnly,
    InSync,
    PlaintextNewer,
    CiphertextNewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactStatus {
    pub plaintext: PathBuf,
    pub ciphertext: PathBuf,
    pub plaintext_modified: Option<DateTime<Utc>>,
    pub ciphertext_modified: Option<DateTime<Utc>>,
    pub state: SyncState,
    /// `None` when the plaintext is missing.
    pub encrypt: Option<Assessment>,
    /// `None` when the ciphertext is missing.
    pub decrypt: Option<Assessment>,
}

/// Applies encrypt, decrypt, cleanup and check across a layout.
pub struct Orchestrator<'a> {
    backend: &'a dyn Backend,
    layout: &'a ArtifactLayout,
    keys: &'a KeyStore,
    mode: KeyMode,
    digest: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        backend: &'a dyn Backend,
        layout: &'a ArtifactLayout,
        keys: &'a KeyStore,
        mode: KeyMode,
    ) -> Self {
        Self {
            backend,
            layout,
            keys,
            mode,
            digest: false,
        }
    }

    /// Short-circuit identical content using BLAKE3 sidecars.
    pub fn with_digest(mut self, enabled: bool) -> Self {
        self.digest = enabled;
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        self.layout
    }

    /// Encrypt every plaintext artifact.
    ///
    /// A newer ciphertext is only overwritten when `confirmer` agrees; pass
    /// [`crate::AlwaysConfirm`] for force mode.
    pub fn encrypt_all(&self, confirmer: &mut dyn Confirmer) -> Result<BatchReport> {
        let plaintexts = self.layout.discover_plaintexts()?;
        let mut report = BatchReport::default();
        if plaintexts.is_empty() {
            return Ok(report);
        }
        self.backend.probe()?;

        for plaintext in plaintexts {
            let outcome = settle(self.encrypt_one(&plaintext, confirmer))?;
            log_outcome("encrypt", &plaintext, &outcome);
            report.push(plaintext, outcome);
        }
        Ok(report)
    }

    /// Decrypt every ciphertext twin. Newer plaintexts are never overwritten.
    pub fn decrypt_all(&self) -> Result<BatchReport> {
        let ciphertexts = self.layout.discover_ciphertexts()?;
        let mut report = BatchReport::default();
        if ciphertexts.is_empty() {
            return Ok(report);
        }
        self.backend.probe()?;

        for ciphertext in ciphertexts {
            let outcome = settle(self.decrypt_one(&ciphertext))?;
            log_outcome("decrypt", &ciphertext, &outcome);
            report.push(ciphertext, outcome);
        }
        Ok(report)
    }

    /// Erase plaintexts whose ciphertext twin is present and not older.
    ///
    /// With `verify`, the twin is decrypted to a private temp file and must
    /// match the plaintext byte for byte.
    pub fn cleanup(&self, verify: bool) -> Result<BatchReport> {
        let plaintexts = self.layout.discover_plaintexts()?;
        let mut report = BatchReport::default();
        if verify && !plaintexts.is_empty() {
            self.backend.probe()?;
        }

        for plaintext in plaintexts {
            let outcome = settle(self.cleanup_one(&plaintext, verify))?;
            log_outcome("cleanup", &plaintext, &outcome);
            report.push(plaintext, outcome);
        }
        Ok(report)
    }

    /// Report plaintexts lacking a ciphertext twin. Read-only.
    ///
    /// Zero-byte plaintexts go to `empty` rather than `missing`, even without
    /// a twin: encryption skips them, so no twin can ever exist and they never
    /// make the report fail.
    pub fn check(&self) -> Result<CheckReport> {
        let mut report = CheckReport::default();
        for plaintext in self.layout.discover_plaintexts()? {
            let pair = self.layout.pair_for_plaintext(&plaintext);
            if fs::metadata(&plaintext)?.len() == 0 {
                report.empty.push(plaintext);
                continue;
            }
            if !pair.ciphertext.is_file() {
                report.missing.push(plaintext);
                continue;
            }
            let times = Timestamps::read(&pair)?;
            if conflict::assess_times(Direction::Decrypt, times) == Assessment::Conflict {
                report.stale.push(plaintext.clone());
            }
            report.covered.push(plaintext);
        }
        Ok(report)
    }

    /// Timestamps and assessments for every known artifact. Read-only.
    pub fn status(&self) -> Result<Vec<ArtifactStatus>> {
        let mut statuses = Vec::new();
        for pair in self.layout.discover_pairs()? {
            let times = Timestamps::read(&pair)?;
            let state = match (times.plaintext, times.ciphertext) {
                (Some(_), None) => SyncState::PlaintextOnly,
                (None, Some(_)) => SyncState::CiphertextOnly,
                (Some(pt), Some(ct)) if pt > ct => SyncState::PlaintextNewer,
                (Some(pt), Some(ct)) if ct > pt => SyncState::CiphertextNewer,
                _ => SyncState::InSync,
            };
            let sidecar = self.sidecar_for(&pair.plaintext);
            let encrypt = times
                .plaintext
                .map(|_| conflict::assess(&pair, Direction::Encrypt, sidecar.as_deref()))
                .transpose()?;
            let decrypt = times
                .ciphertext
                .map(|_| conflict::assess(&pair, Direction::Decrypt, sidecar.as_deref()))
                .transpose()?;

            statuses.push(ArtifactStatus {
                plaintext_modified: times.plaintext.map(DateTime::<Utc>::from),
                ciphertext_modified: times.ciphertext.map(DateTime::<Utc>::from),
                plaintext: pair.plaintext,
                ciphertext: pair.ciphertext,
                state,
                encrypt,
                decrypt,
            });
        }
        Ok(statuses)
    }

    fn encrypt_one(&self, plaintext: &Path, confirmer: &mut dyn Confirmer) -> Result<Outcome> {
        let pair = self.layout.pair_for_plaintext(plaintext);
        if fs::metadata(&pair.plaintext)?.len() == 0 {
            return Err(StatecryptError::EmptySource(pair.plaintext));
        }

        let sidecar = self.sidecar_for(&pair.plaintext);
        match conflict::assess(&pair, Direction::Encrypt, sidecar.as_deref())? {
            Assessment::Unchanged => return Ok(Outcome::Unchanged),
            Assessment::Conflict => {
                tracing::warn!(
                    ciphertext = %pair.ciphertext.display(),
                    "Ciphertext is newer than plaintext"
                );
                let prompt = format!(
                    "{} is newer than {}. Overwrite it?",
                    pair.ciphertext.display(),
                    pair.plaintext.display()
                );
                if !confirmer.confirm(&prompt)? {
                    return Err(StatecryptError::Declined(pair.ciphertext));
                }
            }
            Assessment::SafeToEncrypt | Assessment::SafeToDecrypt => {}
        }

        self.backend.encrypt(&CryptRequest {
            input: &pair.plaintext,
            output: &pair.ciphertext,
            key_id: self.keys.key_id(),
            mode: self.mode,
            passphrase: self.keys.passphrase()?,
        })?;
        // Equal timestamps keep an unchanged re-run conflict-free.
        sync_mtime(&pair.plaintext, &pair.ciphertext)?;
        if let Some(sidecar) = &sidecar {
            conflict::write_digest_sidecar(&pair, sidecar)?;
        }
        Ok(Outcome::Encrypted)
    }

    fn decrypt_one(&self, ciphertext: &Path) -> Result<Outcome> {
        let pair = self.pair_for_ciphertext(ciphertext)?;
        if fs::metadata(&pair.ciphertext)?.len() == 0 {
            return Err(StatecryptError::EmptySource(pair.ciphertext));
        }
        self.backend
            .ensure_decryption_key(&pair.ciphertext, self.keys.key_id())?;

        let sidecar = self.sidecar_for(&pair.plaintext);
        match conflict::assess(&pair, Direction::Decrypt, sidecar.as_deref())? {
            Assessment::Unchanged => Ok(Outcome::Unchanged),
            Assessment::Conflict => {
                let side_file = conflict_side_path(&pair.plaintext, Utc::now());
                self.decrypt_to(&pair.ciphertext, &side_file)?;
                tracing::warn!(
                    plaintext = %pair.plaintext.display(),
                    side_file = %side_file.display(),
                    "Plaintext is newer than ciphertext; wrote conflict side file"
                );
                Ok(Outcome::Conflicted { side_file })
            }
            Assessment::SafeToDecrypt | Assessment::SafeToEncrypt => {
                self.decrypt_to(&pair.ciphertext, &pair.plaintext)?;
                sync_mtime(&pair.ciphertext, &pair.plaintext)?;
                if let Some(sidecar) = &sidecar {
                    conflict::write_digest_sidecar(&pair, sidecar)?;
                }
                Ok(Outcome::Decrypted)
            }
        }
    }

    fn cleanup_one(&self, plaintext: &Path, verify: bool) -> Result<Outcome> {
        let pair = self.layout.pair_for_plaintext(plaintext);
        let twin_present = fs::metadata(&pair.ciphertext)
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false);
        if !twin_present {
            return Ok(skipped("no ciphertext twin"));
        }

        let times = Timestamps::read(&pair)?;
        if conflict::assess_times(Direction::Decrypt, times) == Assessment::Conflict {
            return Ok(skipped("unencrypted changes"));
        }

        if verify {
            self.backend
                .ensure_decryption_key(&pair.ciphertext, self.keys.key_id())?;
            // Never committed; erased when dropped.
            let probe = StagedFile::new(&pair.plaintext)?;
            self.decrypt_to(&pair.ciphertext, probe.path())?;
            if fs::read(probe.path())? != fs::read(&pair.plaintext)? {
                return Ok(skipped("ciphertext does not match plaintext"));
            }
        }

        secure_erase(&pair.plaintext)?;
        Ok(Outcome::Removed)
    }

    fn decrypt_to(&self, ciphertext: &Path, output: &Path) -> Result<()> {
        self.backend.decrypt(&CryptRequest {
            input: ciphertext,
            output,
            key_id: self.keys.key_id(),
            mode: self.mode,
            passphrase: self.keys.passphrase()?,
        })
    }

    fn pair_for_ciphertext(&self, ciphertext: &Path) -> Result<ArtifactPair> {
        self.layout.pair_for_ciphertext(ciphertext).ok_or_else(|| {
            StatecryptError::InvalidInput(format!(
                "{} does not end in .{}",
                ciphertext.display(),
                self.layout.encrypted_suffix()
            ))
        })
    }

    fn sidecar_for(&self, plaintext: &Path) -> Option<PathBuf> {
        self.digest
            .then(|| self.layout.digest_path_for(plaintext))
    }
}

/// Fold a per-artifact result into an outcome; fatal errors propagate.
fn settle(result: Result<Outcome>) -> Result<Outcome> {
    match result {
        Ok(outcome) => Ok(outcome),
        Err(err) if err.is_fatal() => Err(err),
        Err(StatecryptError::EmptySource(_)) => Ok(skipped("empty source file")),
        Err(StatecryptError::Declined(_)) => Ok(Outcome::Declined),
        Err(err) => Ok(Outcome::Failed {
            error: err.to_string(),
        }),
    }
}

fn skipped(reason: &str) -> Outcome {
    Outcome::Skipped {
        reason: reason.to_string(),
    }
}

fn log_outcome(operation: &str, path: &Path, outcome: &Outcome) {
    // Conflicts are warned about where they are detected.
    let path = path.display();
    match outcome {
        Outcome::Failed { error } => tracing::info!(operation, %path, %error, "Artifact failed"),
        Outcome::Skipped { reason } => tracing::info!(operation, %path, %reason, "Artifact skipped"),
        Outcome::Declined => tracing::info!(operation, %path, "Overwrite declined"),
        Outcome::Conflicted { side_file } => {
            tracing::info!(operation, %path, side_file = %side_file.display(), "Conflict side file kept")
        }
        other => tracing::info!(operation, %path, outcome = ?other, "Artifact processed"),
    }
}

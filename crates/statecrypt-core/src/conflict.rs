//! Staleness detection between a plaintext artifact and its ciphertext twin.
//!
//! The decision is made from last-modified timestamps. When content digests
//! are enabled, a would-be conflict is downgraded to [`Assessment::Unchanged`]
//! if both files still hash to the BLAKE3 pair recorded at the last sync:
//!
//! ```text
//! X.<suffix>.blake3:  <plaintext digest> <ciphertext digest>
//! ```

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use serde::Serialize;

use crate::artifact::ArtifactPair;
use crate::error::{Result, StatecryptError};
use crate::fs::{modified_time, write_private_file};

/// Which side is being overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// plaintext -> ciphertext
    Encrypt,
    /// ciphertext -> plaintext
    Decrypt,
}

/// Outcome of comparing the two representations before an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    SafeToEncrypt,
    SafeToDecrypt,
    /// The side being overwritten is strictly newer than the source.
    Conflict,
    /// Timestamps disagree but both sides still match the recorded digests.
    Unchanged,
}

/// Last-modified instants of both sides; `None` when a file is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub plaintext: Option<SystemTime>,
    pub ciphertext: Option<SystemTime>,
}

impl Timestamps {
    pub fn read(pair: &ArtifactPair) -> Result<Self> {
        Ok(Self {
            plaintext: modified_time(&pair.plaintext)?,
            ciphertext: modified_time(&pair.ciphertext)?,
        })
    }
}

/// Pure timestamp comparison. Ties are safe in both directions.
pub fn assess_times(direction: Direction, times: Timestamps) -> Assessment {
    match direction {
        Direction::Encrypt => match (times.plaintext, times.ciphertext) {
            (Some(pt), Some(ct)) if ct > pt => Assessment::Conflict,
            _ => Assessment::SafeToEncrypt,
        },
        Direction::Decrypt => match (times.plaintext, times.ciphertext) {
            (Some(pt), Some(ct)) if pt > ct => Assessment::Conflict,
            _ => Assessment::SafeToDecrypt,
        },
    }
}

/// Assess an artifact pair on disk.
///
/// `digest_sidecar` is the path of the recorded digest pair when content
/// digests are enabled. It is only consulted for a timestamp conflict.
///
/// # Errors
///
/// Returns `NotFound` if the source of the operation does not exist.
pub fn assess(
    pair: &ArtifactPair,
    direction: Direction,
    digest_sidecar: Option<&Path>,
) -> Result<Assessment> {
    let times = Timestamps::read(pair)?;
    let (source, source_time) = match direction {
        Direction::Encrypt => (&pair.plaintext, times.plaintext),
        Direction::Decrypt => (&pair.ciphertext, times.ciphertext),
    };
    if source_time.is_none() {
        return Err(StatecryptError::NotFound(source.display().to_string()));
    }

    let assessment = assess_times(direction, times);
    if assessment == Assessment::Conflict {
        if let Some(sidecar) = digest_sidecar {
            if digests_match(pair, sidecar)? {
                return Ok(Assessment::Unchanged);
            }
        }
    }
    Ok(assessment)
}

/// Hex BLAKE3 digest of a file's contents.
pub fn content_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Record the digests of both sides after they were brought in sync.
pub fn write_digest_sidecar(pair: &ArtifactPair, sidecar: &Path) -> Result<()> {
    let line = format!(
        "{} {}\n",
        content_digest(&pair.plaintext)?,
        content_digest(&pair.ciphertext)?
    );
    write_private_file(sidecar, line.as_bytes())?;
    Ok(())
}

fn digests_match(pair: &ArtifactPair, sidecar: &Path) -> Result<bool> {
    let stored = match fs::read_to_string(sidecar) {
        Ok(stored) => stored,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    let mut parts = stored.split_whitespace();
    let (Some(plaintext), Some(ciphertext), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Ok(false);
    };
    Ok(plaintext == content_digest(&pair.plaintext)?
        && ciphertext == content_digest(&pair.ciphertext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::set_modified_time;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    fn at(secs: u64) -> Option<SystemTime> {
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn times(plaintext: Option<SystemTime>, ciphertext: Option<SystemTime>) -> Timestamps {
        Timestamps {
            plaintext,
            ciphertext,
        }
    }

    #[test]
    fn test_encrypt_assessment() {
        let enc = Direction::Encrypt;
        assert_eq!(assess_times(enc, times(at(10), None)), Assessment::SafeToEncrypt);
        assert_eq!(assess_times(enc, times(at(10), at(5))), Assessment::SafeToEncrypt);
        assert_eq!(assess_times(enc, times(at(10), at(10))), Assessment::SafeToEncrypt);
        assert_eq!(assess_times(enc, times(at(10), at(11))), Assessment::Conflict);
    }

    #[test]
    fn test_decrypt_assessment() {
        let dec = Direction::Decrypt;
        assert_eq!(assess_times(dec, times(None, at(10))), Assessment::SafeToDecrypt);
        assert_eq!(assess_times(dec, times(at(5), at(10))), Assessment::SafeToDecrypt);
        assert_eq!(assess_times(dec, times(at(10), at(10))), Assessment::SafeToDecrypt);
        assert_eq!(assess_times(dec, times(at(11), at(10))), Assessment::Conflict);
    }

    fn pair_in(dir: &Path) -> ArtifactPair {
        ArtifactPair {
            plaintext: dir.join("prod.tfstate"),
            ciphertext: dir.join("prod.tfstate.gpg"),
        }
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let dir = tempdir().unwrap();
        let pair = pair_in(dir.path());

        let err = assess(&pair, Direction::Encrypt, None).unwrap_err();
        assert!(matches!(err, StatecryptError::NotFound(_)));
        let err = assess(&pair, Direction::Decrypt, None).unwrap_err();
        assert!(matches!(err, StatecryptError::NotFound(_)));
    }

    #[test]
    fn test_assess_reads_file_times() {
        let dir = tempdir().unwrap();
        let pair = pair_in(dir.path());
        fs::write(&pair.plaintext, b"{\"serial\": 2}").unwrap();
        fs::write(&pair.ciphertext, b"opaque").unwrap();

        let base = SystemTime::now() - Duration::from_secs(600);
        set_modified_time(&pair.ciphertext, base).unwrap();
        set_modified_time(&pair.plaintext, base + Duration::from_secs(60)).unwrap();

        assert_eq!(
            assess(&pair, Direction::Encrypt, None).unwrap(),
            Assessment::SafeToEncrypt
        );
        assert_eq!(
            assess(&pair, Direction::Decrypt, None).unwrap(),
            Assessment::Conflict
        );
    }

    #[test]
    fn test_digest_short_circuits_touched_plaintext() {
        let dir = tempdir().unwrap();
        let pair = pair_in(dir.path());
        let sidecar: PathBuf = dir.path().join("prod.tfstate.gpg.blake3");
        fs::write(&pair.plaintext, b"{\"serial\": 2}").unwrap();
        fs::write(&pair.ciphertext, b"opaque").unwrap();
        write_digest_sidecar(&pair, &sidecar).unwrap();

        // Touch without changing content.
        let base = SystemTime::now() - Duration::from_secs(600);
        set_modified_time(&pair.ciphertext, base).unwrap();
        set_modified_time(&pair.plaintext, base + Duration::from_secs(60)).unwrap();

        assert_eq!(
            assess(&pair, Direction::Decrypt, Some(&sidecar)).unwrap(),
            Assessment::Unchanged
        );

        fs::write(&pair.plaintext, b"{\"serial\": 3}").unwrap();
        assert_eq!(
            assess(&pair, Direction::Decrypt, Some(&sidecar)).unwrap(),
            Assessment::Conflict
        );
    }

    #[test]
    fn test_digest_never_hides_a_newer_ciphertext() {
        let dir = tempdir().unwrap();
        let pair = pair_in(dir.path());
        let sidecar = dir.path().join("prod.tfstate.gpg.blake3");
        fs::write(&pair.plaintext, b"{\"serial\": 1}").unwrap();
        fs::write(&pair.ciphertext, b"opaque-1").unwrap();
        write_digest_sidecar(&pair, &sidecar).unwrap();

        // A collaborator publishes a new ciphertext without touching the sidecar.
        fs::write(&pair.ciphertext, b"opaque-2").unwrap();
        let base = SystemTime::now() - Duration::from_secs(600);
        set_modified_time(&pair.plaintext, base).unwrap();
        set_modified_time(&pair.ciphertext, base + Duration::from_secs(60)).unwrap();
        assert_eq!(
            assess(&pair, Direction::Decrypt, Some(&sidecar)).unwrap(),
            Assessment::SafeToDecrypt
        );

        // Local plaintext touched later: the changed ciphertext still counts.
        set_modified_time(&pair.plaintext, base + Duration::from_secs(120)).unwrap();
        assert_eq!(
            assess(&pair, Direction::Decrypt, Some(&sidecar)).unwrap(),
            Assessment::Conflict
        );
    }

    #[test]
    fn test_malformed_sidecar_is_ignored() {
        let dir = tempdir().unwrap();
        let pair = pair_in(dir.path());
        let sidecar = dir.path().join("prod.tfstate.gpg.blake3");
        fs::write(&pair.plaintext, b"a").unwrap();
        fs::write(&pair.ciphertext, b"b").unwrap();
        fs::write(&sidecar, format!("{}\n", content_digest(&pair.plaintext).unwrap())).unwrap();

        let base = SystemTime::now() - Duration::from_secs(600);
        set_modified_time(&pair.plaintext, base).unwrap();
        set_modified_time(&pair.ciphertext, base + Duration::from_secs(60)).unwrap();
        assert_eq!(
            assess(&pair, Direction::Encrypt, Some(&sidecar)).unwrap(),
            Assessment::Conflict
        );
    }

    #[test]
    fn test_missing_sidecar_falls_back_to_timestamps() {
        let dir = tempdir().unwrap();
        let pair = pair_in(dir.path());
        fs::write(&pair.plaintext, b"a").unwrap();

        let sidecar = dir.path().join("absent.blake3");
        assert_eq!(
            assess(&pair, Direction::Encrypt, Some(&sidecar)).unwrap(),
            Assessment::SafeToEncrypt
        );
    }
}

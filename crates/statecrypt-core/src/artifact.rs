//! Artifact naming and discovery.
//!
//! A logical artifact has a plaintext working copy `X` and a ciphertext twin
//! `X.<suffix>`. Conflicting decryptions land in `X.conflict.<timestamp>`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Default plaintext match suffixes.
pub const DEFAULT_SUFFIXES: &[&str] = &[".tfstate", ".tfstate.backup"];

/// Default excluded directory names (backend working caches).
pub const DEFAULT_EXCLUDES: &[&str] = &[".terraform"];

/// Infix marking a conflict side file.
pub const CONFLICT_INFIX: &str = ".conflict.";

/// Extension of the optional content digest sidecar.
pub const DIGEST_EXTENSION: &str = "blake3";

const CONFLICT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Where artifacts live and how their files are named.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
    suffixes: Vec<String>,
    excludes: Vec<String>,
    encrypted_suffix: String,
}

/// The two representations of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub plaintext: PathBuf,
    pub ciphertext: PathBuf,
}

impl ArtifactLayout {
    /// Create a layout rooted at `root` whose ciphertexts end in `.<encrypted_suffix>`.
    pub fn new(root: impl Into<PathBuf>, encrypted_suffix: &str) -> Self {
        Self {
            root: root.into(),
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            excludes: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            encrypted_suffix: encrypted_suffix.trim_start_matches('.').to_string(),
        }
    }

    pub fn with_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excludes<I, S>(mut self, excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn encrypted_suffix(&self) -> &str {
        &self.encrypted_suffix
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// `X` -> `X.<suffix>`
    pub fn ciphertext_path_for(&self, plaintext: &Path) -> PathBuf {
        append_to_file_name(plaintext, &format!(".{}", self.encrypted_suffix))
    }

    /// `X.<suffix>` -> `X`, or `None` if `ciphertext` does not carry the suffix.
    pub fn plaintext_path_for(&self, ciphertext: &Path) -> Option<PathBuf> {
        let name = ciphertext.file_name()?.to_str()?;
        let stem = name.strip_suffix(&format!(".{}", self.encrypted_suffix))?;
        if stem.is_empty() {
            return None;
        }
        Some(ciphertext.with_file_name(stem))
    }

    /// `X.<suffix>` -> `X.<suffix>.blake3`
    pub fn digest_path_for(&self, plaintext: &Path) -> PathBuf {
        append_to_file_name(
            &self.ciphertext_path_for(plaintext),
            &format!(".{}", DIGEST_EXTENSION),
        )
    }

    pub fn is_ciphertext(&self, path: &Path) -> bool {
        self.plaintext_path_for(path)
            .map(|plain| self.is_plaintext_candidate(&plain))
            .unwrap_or(false)
    }

    /// Whether a file name looks like a plaintext artifact.
    pub fn is_plaintext_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.contains(CONFLICT_INFIX) {
            return false;
        }
        self.suffixes.iter().any(|suffix| {
            name.len() > suffix.len() && name.ends_with(suffix.as_str())
        })
    }

    pub fn pair_for_plaintext(&self, plaintext: &Path) -> ArtifactPair {
        ArtifactPair {
            plaintext: plaintext.to_path_buf(),
            ciphertext: self.ciphertext_path_for(plaintext),
        }
    }

    pub fn pair_for_ciphertext(&self, ciphertext: &Path) -> Option<ArtifactPair> {
        Some(ArtifactPair {
            plaintext: self.plaintext_path_for(ciphertext)?,
            ciphertext: ciphertext.to_path_buf(),
        })
    }

    /// All plaintext artifacts under the root, sorted.
    pub fn discover_plaintexts(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        self.visit(&self.root, &mut |path| {
            if self.is_plaintext_candidate(path) && !self.is_ciphertext(path) {
                found.push(path.to_path_buf());
            }
        })?;
        found.sort();
        Ok(found)
    }

    /// All ciphertext twins under the root, sorted.
    pub fn discover_ciphertexts(&self) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        self.visit(&self.root, &mut |path| {
            if self.is_ciphertext(path) {
                found.push(path.to_path_buf());
            }
        })?;
        found.sort();
        Ok(found)
    }

    /// Every artifact pair known from either side, sorted by plaintext path.
    pub fn discover_pairs(&self) -> Result<Vec<ArtifactPair>> {
        let mut pairs: Vec<ArtifactPair> = self
            .discover_plaintexts()?
            .iter()
            .map(|p| self.pair_for_plaintext(p))
            .collect();
        for ciphertext in self.discover_ciphertexts()? {
            if let Some(pair) = self.pair_for_ciphertext(&ciphertext) {
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        pairs.sort_by(|a, b| a.plaintext.cmp(&b.plaintext));
        Ok(pairs)
    }

    fn visit(&self, dir: &Path, on_file: &mut dyn FnMut(&Path)) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            // file_type() does not follow symlinks.
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                let excluded = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| self.excludes.iter().any(|ex| ex == n))
                    .unwrap_or(false);
                if !excluded {
                    self.visit(&path, on_file)?;
                }
            } else if file_type.is_file() {
                on_file(&path);
            }
        }
        Ok(())
    }
}

/// A side file name for `plaintext` that does not exist yet.
///
/// `X.conflict.20260101T120000Z`, then `-1`, `-2`, ... when taken.
pub fn conflict_side_path(plaintext: &Path, now: DateTime<Utc>) -> PathBuf {
    let stamp = now.format(CONFLICT_TIMESTAMP_FORMAT).to_string();
    let base = append_to_file_name(plaintext, &format!("{}{}", CONFLICT_INFIX, stamp));
    if !base.exists() {
        return base;
    }
    let mut counter = 1u32;
    loop {
        let candidate = append_to_file_name(&base, &format!("-{}", counter));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn append_to_file_name(path: &Path, extra: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(extra);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"{}").unwrap();
    }

    #[test]
    fn test_twin_naming() {
        let layout = ArtifactLayout::new("/repo", "gpg");
        let plain = Path::new("/repo/env/prod.tfstate");
        let cipher = layout.ciphertext_path_for(plain);

        assert_eq!(cipher, PathBuf::from("/repo/env/prod.tfstate.gpg"));
        assert_eq!(layout.plaintext_path_for(&cipher).unwrap(), plain);
        assert_eq!(
            layout.digest_path_for(plain),
            PathBuf::from("/repo/env/prod.tfstate.gpg.blake3")
        );
        assert!(layout.plaintext_path_for(Path::new("/repo/prod.tfstate")).is_none());
    }

    #[test]
    fn test_candidate_matching() {
        let layout = ArtifactLayout::new(".", ".age");
        assert_eq!(layout.encrypted_suffix(), "age");

        assert!(layout.is_plaintext_candidate(Path::new("prod.tfstate")));
        assert!(layout.is_plaintext_candidate(Path::new("prod.tfstate.backup")));
        assert!(!layout.is_plaintext_candidate(Path::new(".tfstate")));
        assert!(!layout.is_plaintext_candidate(Path::new("prod.tfstate.age")));
        assert!(!layout.is_plaintext_candidate(Path::new(
            "prod.tfstate.conflict.20260101T000000Z"
        )));
        assert!(layout.is_ciphertext(Path::new("prod.tfstate.age")));
        assert!(!layout.is_ciphertext(Path::new("notes.txt.age")));
    }

    #[test]
    fn test_discovery_skips_excluded_and_ciphertext() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b/prod.tfstate"));
        touch(&root.join("a/dev.tfstate"));
        touch(&root.join("a/dev.tfstate.gpg"));
        touch(&root.join("a/.terraform/cached.tfstate"));
        touch(&root.join("a/dev.tfstate.conflict.20260101T000000Z"));
        touch(&root.join("c/orphan.tfstate.backup.gpg"));
        touch(&root.join("README.md"));

        let layout = ArtifactLayout::new(root, "gpg");

        assert_eq!(
            layout.discover_plaintexts().unwrap(),
            vec![root.join("a/dev.tfstate"), root.join("b/prod.tfstate")]
        );
        assert_eq!(
            layout.discover_ciphertexts().unwrap(),
            vec![
                root.join("a/dev.tfstate.gpg"),
                root.join("c/orphan.tfstate.backup.gpg")
            ]
        );

        let pairs = layout.discover_pairs().unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].plaintext, root.join("a/dev.tfstate"));
        assert_eq!(pairs[2].plaintext, root.join("c/orphan.tfstate.backup"));
    }

    #[test]
    fn test_custom_suffixes_and_excludes() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("secrets/app.env"));
        touch(&root.join("vendor/lib.env"));
        touch(&root.join("prod.tfstate"));

        let layout = ArtifactLayout::new(root, "age")
            .with_suffixes([".env"])
            .with_excludes(["vendor"]);

        assert_eq!(
            layout.discover_plaintexts().unwrap(),
            vec![root.join("secrets/app.env")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_discovery_does_not_follow_symlinked_dirs() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        touch(&outside.path().join("other.tfstate"));
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let layout = ArtifactLayout::new(dir.path(), "gpg");
        assert!(layout.discover_plaintexts().unwrap().is_empty());
    }

    #[test]
    fn test_conflict_side_path_never_reuses_a_name() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("prod.tfstate");
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();

        let first = conflict_side_path(&plain, now);
        assert_eq!(
            first,
            dir.path().join("prod.tfstate.conflict.20260304T050607Z")
        );
        touch(&first);

        let second = conflict_side_path(&plain, now);
        assert_eq!(
            second,
            dir.path().join("prod.tfstate.conflict.20260304T050607Z-1")
        );
        touch(&second);

        let third = conflict_side_path(&plain, now);
        assert!(third.to_string_lossy().ends_with("-2"));
    }
}

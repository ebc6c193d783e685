use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statecrypt_core::artifact::{DEFAULT_EXCLUDES, DEFAULT_SUFFIXES};
use statecrypt_core::keystore::validate_key_id;
use statecrypt_core::KeyMode;

use crate::constants::{APP_DIR, CONFIG_FILE, KEYS_DIR};
use crate::errors::CliError;

/// Default logical key identifier.
pub const DEFAULT_KEY_ID: &str = "statecrypt";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatecryptConfig {
    pub artifacts: ArtifactsSection,
    pub key: KeySection,
    pub backend: BackendSection,
    pub conflict: ConflictSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactsSection {
    pub root: String,
    pub suffixes: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeySection {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Default for KeySection {
    fn default() -> Self {
        Self {
            id: DEFAULT_KEY_ID.to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    pub kind: BackendKind,
    pub mode: KeyMode,
    pub gpg_binary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpg_homedir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_suffix: Option<String>,
    /// scrypt log2(N) for age passphrase encryption; age calibrates when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_work_factor: Option<u8>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::Gpg,
            mode: KeyMode::Symmetric,
            gpg_binary: "gpg".to_string(),
            gpg_homedir: None,
            encrypted_suffix: None,
            age_work_factor: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConflictSection {
    /// Skip work when content is unchanged, using BLAKE3 sidecars.
    pub content_digest: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gpg,
    Age,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Gpg => write!(f, "gpg"),
            BackendKind::Age => write!(f, "age"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = CliError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "gpg" => Ok(BackendKind::Gpg),
            "age" => Ok(BackendKind::Age),
            other => Err(CliError::invalid_input(format!(
                "Unknown backend '{}' (expected gpg or age)",
                other
            ))),
        }
    }
}

impl StatecryptConfig {
    /// Reject values that would make discovery or key handling ambiguous.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.artifacts.suffixes.is_empty() {
            return Err(CliError::invalid_input(
                "[artifacts] suffixes must list at least one suffix",
            ));
        }
        if self.artifacts.suffixes.iter().any(|s| s.trim().is_empty()) {
            return Err(CliError::invalid_input(
                "[artifacts] suffixes cannot contain empty values",
            ));
        }
        if self.artifacts.root.trim().is_empty() {
            return Err(CliError::invalid_input("[artifacts] root cannot be empty"));
        }
        validate_key_id(&self.key.id)
            .map_err(|e| CliError::invalid_input(format!("[key] id: {}", e)))?;
        if self.backend.gpg_binary.trim().is_empty() {
            return Err(CliError::invalid_input(
                "[backend] gpg_binary cannot be empty",
            ));
        }
        if let Some(factor) = self.backend.age_work_factor {
            if !(1..=30).contains(&factor) {
                return Err(CliError::invalid_input(format!(
                    "[backend] age_work_factor must be between 1 and 30, got {}",
                    factor
                )));
            }
        }
        if let Some(suffix) = &self.backend.encrypted_suffix {
            let trimmed = suffix.trim_start_matches('.');
            if trimmed.is_empty() || trimmed.contains('/') {
                return Err(CliError::invalid_input(format!(
                    "[backend] encrypted_suffix is not a valid file extension: {:?}",
                    suffix
                )));
            }
        }
        self.check_suffix_overlap()
    }

    /// The encrypted extension used once defaults are applied.
    pub fn effective_encrypted_suffix(&self) -> String {
        match &self.backend.encrypted_suffix {
            Some(suffix) => suffix.trim_start_matches('.').to_string(),
            None => self.backend.kind.to_string(),
        }
    }

    /// A plaintext name must never also read as a ciphertext name.
    fn check_suffix_overlap(&self) -> Result<(), CliError> {
        let encrypted = format!(".{}", self.effective_encrypted_suffix());
        let clash = self
            .artifacts
            .suffixes
            .iter()
            .find(|suffix| suffix.ends_with(&encrypted) || encrypted.ends_with(suffix.as_str()));
        match clash {
            Some(suffix) => Err(CliError::invalid_input(format!(
                "[artifacts] suffix {:?} overlaps the encrypted suffix {:?}; plaintexts would be mistaken for ciphertexts",
                suffix, encrypted
            ))),
            None => Ok(()),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join(CONFIG_FILE))
}

pub fn default_key_dir() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join(KEYS_DIR))
}

/// Read and validate a config file.
pub fn read_config(path: &Path) -> anyhow::Result<StatecryptConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    let config: StatecryptConfig = toml::from_str(&contents).map_err(|e| {
        CliError::invalid_input(format!(
            "Failed to parse config {}: {}",
            path.display(),
            e
        ))
    })?;
    config.validate()?;
    Ok(config)
}

/// Read the config at `path`, or the built-in defaults when it does not exist.
pub fn load_or_default(path: &Path) -> anyhow::Result<StatecryptConfig> {
    if path.exists() {
        read_config(path)
    } else {
        tracing::debug!(path = %path.display(), "No config file; using defaults");
        Ok(StatecryptConfig::default())
    }
}

pub fn write_config(path: &Path, config: &StatecryptConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join(APP_DIR));
        }
    }
    Ok(home_dir()?.join(".config").join(APP_DIR))
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_tilde(value: &str) -> anyhow::Result<PathBuf> {
    if value == "~" {
        return home_dir();
    }
    match value.strip_prefix("~/") {
        Some(rest) => Ok(home_dir()?.join(rest)),
        None => Ok(PathBuf::from(value)),
    }
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: StatecryptConfig = toml::from_str("").unwrap();
        assert_eq!(config, StatecryptConfig::default());
        assert_eq!(config.backend.kind, BackendKind::Gpg);
        assert_eq!(config.backend.mode, KeyMode::Symmetric);
        assert_eq!(config.key.id, DEFAULT_KEY_ID);
        assert_eq!(config.artifacts.suffixes, vec![".tfstate", ".tfstate.backup"]);
        assert!(!config.conflict.content_digest);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config: StatecryptConfig = toml::from_str(
            "[backend]\nkind = \"age\"\nmode = \"asymmetric\"\n\n[conflict]\ncontent_digest = true\n",
        )
        .unwrap();
        assert_eq!(config.backend.kind, BackendKind::Age);
        assert_eq!(config.backend.mode, KeyMode::Asymmetric);
        assert_eq!(config.backend.gpg_binary, "gpg");
        assert!(config.conflict.content_digest);
        assert_eq!(config.artifacts.root, ".");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = StatecryptConfig::default();
        config.key.id = "team-infra".to_string();
        config.backend.encrypted_suffix = Some("enc".to_string());

        write_config(&path, &config).unwrap();
        assert_eq!(read_config(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[artifacts]\nsuffixes = []\n").unwrap();
        assert!(read_config(&path).is_err());

        std::fs::write(&path, "[key]\nid = \"../escape\"\n").unwrap();
        assert!(read_config(&path).is_err());

        std::fs::write(&path, "[backend]\nkind = \"rot13\"\n").unwrap();
        let err = read_config(&path).unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_some());

        std::fs::write(&path, "[backend]\nunknown_key = 1\n").unwrap();
        assert!(read_config(&path).is_err());

        std::fs::write(&path, "[backend]\nage_work_factor = 64\n").unwrap();
        assert!(read_config(&path).is_err());
    }

    #[test]
    fn test_encrypted_suffix_cannot_overlap_plaintext_suffixes() {
        let mut config = StatecryptConfig::default();
        config.backend.encrypted_suffix = Some("backup".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(".tfstate.backup"));

        // The default suffix follows the backend kind.
        let mut config = StatecryptConfig::default();
        config.artifacts.suffixes = vec![".tfstate".to_string(), ".tfstate.gpg".to_string()];
        assert!(config.validate().is_err());
        config.backend.kind = BackendKind::Age;
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_encrypted_suffix(), "age");

        let mut config = StatecryptConfig::default();
        config.artifacts.suffixes = vec!["pg".to_string()];
        assert!(config.validate().is_err());

        let mut config = StatecryptConfig::default();
        config.backend.encrypted_suffix = Some(".enc".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_encrypted_suffix(), "enc");
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("AGE".parse::<BackendKind>().unwrap(), BackendKind::Age);
        assert_eq!(BackendKind::Gpg.to_string(), "gpg");
        assert!("pgp".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, StatecryptConfig::default());
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(
            expand_tilde("/srv/keys").unwrap(),
            PathBuf::from("/srv/keys")
        );
        assert_eq!(expand_tilde("keys").unwrap(), PathBuf::from("keys"));
    }
}

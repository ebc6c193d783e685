//! Effective settings: CLI flags and environment over the config file over defaults.

use std::path::{Path, PathBuf};

use statecrypt_core::{AgeBackend, ArtifactLayout, Backend, GpgBackend, KeyMode, KeyStore};

use crate::cli::GlobalArgs;
use crate::config::{default_key_dir, expand_tilde, BackendKind, StatecryptConfig};
use crate::errors::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub key_id: String,
    pub key_dir: PathBuf,
    pub backend: BackendKind,
    pub mode: KeyMode,
    pub gpg_binary: String,
    pub gpg_homedir: Option<PathBuf>,
    pub age_work_factor: Option<u8>,
    pub encrypted_suffix: String,
    pub suffixes: Vec<String>,
    pub excludes: Vec<String>,
    pub content_digest: bool,
}

impl Settings {
    pub fn resolve(global: &GlobalArgs, config: &StatecryptConfig) -> anyhow::Result<Self> {
        let root = match &global.root {
            Some(root) => root.clone(),
            None => expand_tilde(&config.artifacts.root)?,
        };
        let key_id = global
            .key_id
            .clone()
            .unwrap_or_else(|| config.key.id.clone());
        let key_dir = match &config.key.dir {
            Some(dir) => expand_tilde(dir)?,
            None => default_key_dir()?,
        };
        let gpg_homedir = config
            .backend
            .gpg_homedir
            .as_deref()
            .map(expand_tilde)
            .transpose()?;
        let encrypted_suffix = config.effective_encrypted_suffix();

        Ok(Self {
            root,
            key_id,
            key_dir,
            backend: config.backend.kind,
            mode: config.backend.mode,
            gpg_binary: config.backend.gpg_binary.clone(),
            gpg_homedir,
            age_work_factor: config.backend.age_work_factor,
            encrypted_suffix,
            suffixes: config.artifacts.suffixes.clone(),
            excludes: config.artifacts.exclude.clone(),
            content_digest: config.conflict.content_digest,
        })
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.root, &self.encrypted_suffix)
            .with_suffixes(self.suffixes.iter())
            .with_excludes(self.excludes.iter())
    }

    pub fn key_store(&self) -> anyhow::Result<KeyStore> {
        Ok(KeyStore::new(&self.key_dir, &self.key_id)?)
    }

    pub fn backend(&self) -> Box<dyn Backend> {
        match self.backend {
            BackendKind::Gpg => {
                let mut gpg =
                    GpgBackend::with_binary(&self.gpg_binary).with_scratch_dir(&self.key_dir);
                if let Some(homedir) = &self.gpg_homedir {
                    gpg = gpg.with_homedir(homedir);
                }
                Box::new(gpg)
            }
            BackendKind::Age => {
                let mut age = AgeBackend::new(&self.key_dir);
                if let Some(factor) = self.age_work_factor {
                    age = age.with_scrypt_work_factor(factor);
                }
                Box::new(age)
            }
        }
    }

    /// The artifact root, which must be an existing directory.
    pub fn existing_root(&self) -> Result<&Path, CliError> {
        if self.root.is_dir() {
            Ok(&self.root)
        } else {
            Err(CliError::not_found(
                format!("Artifact root not found: {}", self.root.display()),
                "Pass --root, set STATECRYPT_ROOT, or set [artifacts] root in the config.",
            ))
        }
    }
}

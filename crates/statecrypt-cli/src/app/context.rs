//! Application context for the statecrypt CLI.
//!
//! Bundles the global flags with lazily-loaded config, settings, backend and
//! key store so handlers do not thread them around individually.

use std::path::PathBuf;

use once_cell::unsync::OnceCell;
use statecrypt_core::{ArtifactLayout, Backend, KeyStore, Orchestrator};

use crate::cli::GlobalArgs;
use crate::config::{load_or_default, StatecryptConfig};
use crate::ui::UiContext;

use super::resolver::resolve_config_path;
use super::settings::Settings;

pub struct AppContext<'a> {
    global: &'a GlobalArgs,
    ui: UiContext,
    config_path: OnceCell<PathBuf>,
    config: OnceCell<StatecryptConfig>,
    settings: OnceCell<Settings>,
    backend: OnceCell<Box<dyn Backend>>,
    keys: OnceCell<KeyStore>,
    layout: OnceCell<ArtifactLayout>,
}

impl<'a> AppContext<'a> {
    pub fn new(global: &'a GlobalArgs, ui: UiContext) -> Self {
        Self {
            global,
            ui,
            config_path: OnceCell::new(),
            config: OnceCell::new(),
            settings: OnceCell::new(),
            backend: OnceCell::new(),
            keys: OnceCell::new(),
            layout: OnceCell::new(),
        }
    }

    pub fn global(&self) -> &GlobalArgs {
        self.global
    }

    pub fn ui(&self) -> &UiContext {
        &self.ui
    }

    pub fn config_path(&self) -> anyhow::Result<&PathBuf> {
        self.config_path
            .get_or_try_init(|| resolve_config_path(self.global))
    }

    /// The config file, or defaults when it does not exist.
    pub fn config(&self) -> anyhow::Result<&StatecryptConfig> {
        self.config
            .get_or_try_init(|| load_or_default(self.config_path()?))
    }

    pub fn settings(&self) -> anyhow::Result<&Settings> {
        self.settings
            .get_or_try_init(|| Settings::resolve(self.global, self.config()?))
    }

    pub fn backend(&self) -> anyhow::Result<&dyn Backend> {
        let backend = self
            .backend
            .get_or_try_init(|| -> anyhow::Result<_> { Ok(self.settings()?.backend()) })?;
        Ok(&**backend)
    }

    pub fn keys(&self) -> anyhow::Result<&KeyStore> {
        self.keys
            .get_or_try_init(|| self.settings()?.key_store())
    }

    /// Layout over the configured root; the root must exist.
    pub fn layout(&self) -> anyhow::Result<&ArtifactLayout> {
        self.layout.get_or_try_init(|| -> anyhow::Result<_> {
            let settings = self.settings()?;
            settings.existing_root()?;
            Ok(settings.layout())
        })
    }

    /// An orchestrator wired to the configured backend, layout and keys.
    pub fn orchestrator(&self) -> anyhow::Result<Orchestrator<'_>> {
        let settings = self.settings()?;
        Ok(Orchestrator::new(
            self.backend()?,
            self.layout()?,
            self.keys()?,
            settings.mode,
        )
        .with_digest(settings.content_digest))
    }
}

//! Path resolution for the config file.

use std::path::PathBuf;

use crate::cli::GlobalArgs;
use crate::config::default_config_path;

/// `--config` / `STATECRYPT_CONFIG`, else the XDG default.
pub fn resolve_config_path(global: &GlobalArgs) -> anyhow::Result<PathBuf> {
    if let Some(path) = &global.config {
        if !path.as_os_str().is_empty() {
            return Ok(path.clone());
        }
    }
    default_config_path()
}

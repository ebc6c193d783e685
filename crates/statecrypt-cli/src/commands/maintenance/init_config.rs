use serde::Serialize;

use crate::app::AppContext;
use crate::cli::InitConfigArgs;
use crate::config::{write_config, StatecryptConfig};
use crate::errors::CliError;
use crate::output::print_json;
use crate::ui::{badge, hint, kv, print, Badge};

#[derive(Serialize)]
struct InitConfigReport<'a> {
    path: &'a std::path::Path,
    backend: String,
    mode: String,
}

pub fn handle_init_config(app: &AppContext, args: &InitConfigArgs) -> anyhow::Result<()> {
    let ui = app.ui();
    let path = app.config_path()?;
    if path.exists() && !args.force {
        return Err(CliError::invalid_input(format!(
            "Config already exists at {}; pass --force to replace it",
            path.display()
        ))
        .into());
    }

    let mut config = StatecryptConfig::default();
    if let Some(kind) = args.backend {
        config.backend.kind = kind;
    }
    if let Some(mode) = args.mode {
        config.backend.mode = mode;
    }
    if let Some(key_id) = &app.global().key_id {
        config.key.id = key_id.clone();
    }
    config.validate()?;
    write_config(path, &config)?;
    tracing::info!(path = %path.display(), "Wrote config");

    if ui.mode.is_json() {
        return print_json(
            "init-config",
            true,
            &InitConfigReport {
                path,
                backend: config.backend.kind.to_string(),
                mode: config.backend.mode.to_string(),
            },
        );
    }

    print(ui, &badge(ui, Badge::Ok, "Config written"));
    if !ui.quiet {
        print(ui, &kv(ui, "Path", &path.display().to_string()));
        print(ui, &kv(ui, "Backend", &config.backend.kind.to_string()));
        print(ui, &kv(ui, "Mode", &config.backend.mode.to_string()));
        print(ui, &hint(ui, "statecrypt setup"));
    }
    Ok(())
}

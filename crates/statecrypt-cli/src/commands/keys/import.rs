use serde::Serialize;

use crate::app::{read_shared_passphrase, AppContext};
use crate::cli::ImportKeyArgs;
use crate::output::print_json;
use crate::ui::{badge, kv, print, Badge};

#[derive(Serialize)]
struct ImportOutput<'a> {
    key_id: &'a str,
    passphrase_written: bool,
    keypair_imported: bool,
}

pub fn handle_import_key(app: &AppContext, args: &ImportKeyArgs) -> anyhow::Result<()> {
    let ui = app.ui();
    let settings = app.settings()?;
    let backend = app.backend()?;
    let keys = app.keys()?;

    let passphrase = read_shared_passphrase(ui, args.passphrase_file.as_deref())?;
    let report = keys.import_key(backend, settings.mode, args.archive.as_deref(), passphrase)?;

    if ui.mode.is_json() {
        return print_json(
            "import-key",
            true,
            &ImportOutput {
                key_id: keys.key_id(),
                passphrase_written: report.passphrase_written,
                keypair_imported: report.keypair_imported,
            },
        );
    }

    let message = if report.passphrase_written {
        format!("Imported key '{}'", keys.key_id())
    } else {
        format!("Key '{}' already present; passphrase matches", keys.key_id())
    };
    print(ui, &badge(ui, Badge::Ok, &message));
    if !ui.quiet {
        print(ui, &kv(ui, "Passphrase", &keys.passphrase_path().display().to_string()));
        if report.keypair_imported {
            print(ui, &kv(ui, "Keypair", &format!("imported into {}", backend.name())));
        }
    }
    Ok(())
}

use serde::Serialize;

use crate::app::AppContext;
use crate::cli::ExportKeyArgs;
use crate::output::print_json;
use crate::ui::{badge, hint, print, Badge};

#[derive(Serialize)]
struct ExportReport<'a> {
    key_id: &'a str,
    dest: &'a std::path::Path,
}

pub fn handle_export_key(app: &AppContext, args: &ExportKeyArgs) -> anyhow::Result<()> {
    let ui = app.ui();
    let settings = app.settings()?;
    let keys = app.keys()?;
    keys.export_key(app.backend()?, settings.mode, &args.dest)?;

    if ui.mode.is_json() {
        return print_json(
            "export-key",
            true,
            &ExportReport {
                key_id: keys.key_id(),
                dest: &args.dest,
            },
        );
    }

    print(
        ui,
        &badge(
            ui,
            Badge::Ok,
            &format!("Exported key '{}' to {}", keys.key_id(), args.dest.display()),
        ),
    );
    if !ui.quiet {
        print(
            ui,
            &hint(ui, "statecrypt import-key <ARCHIVE> (send the passphrase separately)"),
        );
    }
    Ok(())
}

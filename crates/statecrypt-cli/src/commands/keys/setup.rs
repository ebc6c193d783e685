use serde::Serialize;
use statecrypt_core::keystore::SetupReport;
use statecrypt_core::Confirmer;

use crate::app::AppContext;
use crate::commands::print_header;
use crate::output::print_json;
use crate::ui::{badge, hint, kv, print, Badge, PromptConfirmer, Spinner, UiContext};

/// Hides the spinner while a question is on screen.
struct SpinnerConfirmer<'a> {
    spinner: &'a Spinner,
    inner: PromptConfirmer,
}

impl Confirmer for SpinnerConfirmer<'_> {
    fn confirm(&mut self, prompt: &str) -> statecrypt_core::Result<bool> {
        let inner = &mut self.inner;
        self.spinner.suspend(|| inner.confirm(prompt))
    }
}

#[derive(Serialize)]
struct SetupOutput<'a> {
    key_id: &'a str,
    backend: &'a str,
    backend_version: &'a str,
    mode: String,
    passphrase_created: bool,
    keypair_generated: bool,
}

pub fn handle_setup(app: &AppContext) -> anyhow::Result<()> {
    let ui = app.ui();
    let settings = app.settings()?;
    let backend = app.backend()?;
    let keys = app.keys()?;
    print_header(ui, "setup", None);

    let spinner = Spinner::start(ui, "Preparing key material");
    let mut confirmer = SpinnerConfirmer {
        spinner: &spinner,
        inner: PromptConfirmer::new(ui),
    };
    let result = keys.setup(backend, settings.mode, &mut confirmer);
    spinner.finish();
    let report = result?;

    if ui.mode.is_json() {
        return print_json(
            "setup",
            true,
            &SetupOutput {
                key_id: keys.key_id(),
                backend: backend.name(),
                backend_version: &report.backend_version,
                mode: settings.mode.to_string(),
                passphrase_created: report.passphrase_created,
                keypair_generated: report.keypair_generated,
            },
        );
    }

    print(ui, &badge(ui, Badge::Ok, &summary(&report, keys.key_id())));
    if !ui.quiet {
        print(ui, &kv(ui, "Backend", &format!("{} {}", backend.name(), report.backend_version)));
        print(ui, &kv(ui, "Mode", &settings.mode.to_string()));
        print(ui, &kv(ui, "Passphrase", &keys.passphrase_path().display().to_string()));
        next_steps(ui, &report);
    }
    Ok(())
}

fn summary(report: &SetupReport, key_id: &str) -> String {
    match (report.passphrase_created, report.keypair_generated) {
        (false, false) => format!("Key '{}' already set up", key_id),
        (true, false) => format!("Created passphrase for '{}'", key_id),
        (false, true) => format!("Generated keypair for '{}'", key_id),
        (true, true) => format!("Created passphrase and keypair for '{}'", key_id),
    }
}

fn next_steps(ui: &UiContext, report: &SetupReport) {
    if report.keypair_generated {
        print(ui, &hint(ui, "statecrypt export-key <DEST>"));
    } else if report.passphrase_created {
        print(ui, &hint(ui, "share the passphrase file with collaborators over a secure channel"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_reflects_created_material() {
        let report = SetupReport {
            backend_version: "gpg (GnuPG) 2.4.3".to_string(),
            passphrase_created: true,
            keypair_generated: true,
        };
        assert_eq!(
            summary(&report, "infra"),
            "Created passphrase and keypair for 'infra'"
        );

        let existing = SetupReport {
            passphrase_created: false,
            keypair_generated: false,
            ..report
        };
        assert_eq!(summary(&existing, "infra"), "Key 'infra' already set up");
    }
}

use crate::app::AppContext;
use crate::commands::print_header;
use crate::errors::CliError;
use crate::output::{print_check, print_json};

/// Pre-publish gate: every plaintext artifact must have an encrypted twin.
pub fn handle_check(app: &AppContext) -> anyhow::Result<()> {
    let ui = app.ui();
    let orchestrator = app.orchestrator()?;
    let root = orchestrator.layout().root();
    print_header(ui, "check", Some(root));

    let report = orchestrator.check()?;
    if ui.mode.is_json() {
        print_json("check", report.is_ok(), &report)?;
    } else {
        print_check(ui, root, &report);
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(CliError::CheckFailed(report.missing.len()).into())
    }
}

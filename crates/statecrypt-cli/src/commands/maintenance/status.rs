use serde::Serialize;
use statecrypt_core::orchestrator::ArtifactStatus;

use crate::app::AppContext;
use crate::commands::print_header;
use crate::output::{print_json, print_status};

#[derive(Serialize)]
struct StatusReport<'a> {
    artifacts: &'a [ArtifactStatus],
}

pub fn handle_status(app: &AppContext) -> anyhow::Result<()> {
    let ui = app.ui();
    let orchestrator = app.orchestrator()?;
    let root = orchestrator.layout().root();
    print_header(ui, "status", Some(root));

    let statuses = orchestrator.status()?;
    if ui.mode.is_json() {
        print_json(
            "status",
            true,
            &StatusReport {
                artifacts: &statuses,
            },
        )
    } else {
        print_status(ui, root, &statuses);
        Ok(())
    }
}

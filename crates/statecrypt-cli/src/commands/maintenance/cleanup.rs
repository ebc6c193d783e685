use crate::app::AppContext;
use crate::cli::CleanupArgs;
use crate::commands::print_header;
use crate::output::finish_batch;

pub fn handle_cleanup(app: &AppContext, args: &CleanupArgs) -> anyhow::Result<()> {
    let ui = app.ui();
    let orchestrator = app.orchestrator()?;
    let root = orchestrator.layout().root();
    print_header(ui, "cleanup", Some(root));

    let report = orchestrator.cleanup(args.verify)?;
    finish_batch(ui, "cleanup", root, &report)
}

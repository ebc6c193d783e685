use crate::app::AppContext;
use crate::commands::print_header;
use crate::output::finish_batch;
use crate::ui::Spinner;

pub fn handle_decrypt(app: &AppContext) -> anyhow::Result<()> {
    let ui = app.ui();
    let orchestrator = app.orchestrator()?;
    let root = orchestrator.layout().root();
    print_header(ui, "decrypt", Some(root));

    let spinner = Spinner::start(ui, "Decrypting");
    let result = orchestrator.decrypt_all();
    spinner.finish();

    finish_batch(ui, "decrypt", root, &result?)
}

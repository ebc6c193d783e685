use statecrypt_core::{AlwaysConfirm, Confirmer};

use crate::app::AppContext;
use crate::cli::EncryptArgs;
use crate::commands::print_header;
use crate::output::finish_batch;
use crate::ui::PromptConfirmer;

pub fn handle_encrypt(app: &AppContext, args: &EncryptArgs) -> anyhow::Result<()> {
    let ui = app.ui();
    let orchestrator = app.orchestrator()?;
    let root = orchestrator.layout().root();
    print_header(ui, "encrypt", Some(root));

    let mut confirmer: Box<dyn Confirmer> = if args.force {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(PromptConfirmer::new(ui))
    };
    let report = orchestrator.encrypt_all(&mut *confirmer)?;
    finish_batch(ui, "encrypt", root, &report)
}

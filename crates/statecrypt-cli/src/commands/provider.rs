//! `key-provider`: the OpenTofu external key provider over stdin/stdout.

use std::io;

use crate::app::AppContext;

pub fn handle_key_provider(app: &AppContext) -> anyhow::Result<()> {
    let keys = app.keys()?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    statecrypt_core::provider::serve(keys, stdin.lock(), stdout.lock())?;
    Ok(())
}

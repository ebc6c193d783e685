//! Interactive prompts built on dialoguer.

use std::io;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Password};
use statecrypt_core::{Confirmer, StatecryptError};

use super::context::UiContext;
use super::render::badge;
use super::theme::Badge;

/// Asks on the terminal; answers "no" when prompts are not possible.
pub struct PromptConfirmer {
    ctx: UiContext,
}

impl PromptConfirmer {
    pub fn new(ctx: &UiContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

impl Confirmer for PromptConfirmer {
    fn confirm(&mut self, prompt: &str) -> statecrypt_core::Result<bool> {
        if !self.ctx.interactive {
            tracing::debug!(prompt, "Cannot prompt without a terminal; answering no");
            eprintln!(
                "{}",
                badge(
                    &self.ctx,
                    Badge::Warn,
                    &format!("{} (no terminal; answering no)", prompt)
                )
            );
            return Ok(false);
        }

        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(prompt_error)
    }
}

/// Read a new passphrase twice from the terminal.
pub fn new_passphrase(prompt: &str) -> anyhow::Result<String> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .with_confirmation("Confirm passphrase", "Passphrases do not match")
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

fn prompt_error(err: dialoguer::Error) -> StatecryptError {
    StatecryptError::Io {
        source: io::Error::new(io::ErrorKind::Other, err.to_string()),
    }
}

//! Spinner for slow backend work, using indicatif.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::context::UiContext;

/// An indeterminate spinner drawn on stderr. Inert outside pretty TTY mode.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    pub fn start(ctx: &UiContext, message: &str) -> Self {
        if !ctx.allows_animation() {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        let (template, ticks): (&str, &[&str]) = if ctx.unicode {
            (
                "{spinner:.cyan} {msg}...",
                &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", ""],
            )
        } else {
            ("{spinner} {msg}...", &["|", "/", "-", "\\", ""])
        };
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            bar.set_style(style.tick_strings(ticks));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar: Some(bar) }
    }

    /// Hide the spinner while `f` runs, e.g. to show a prompt.
    pub fn suspend<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }

    pub fn finish(self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::OutputMode;

    #[test]
    fn test_spinner_is_inert_without_tty() {
        let ctx = UiContext {
            is_tty: false,
            color: false,
            unicode: true,
            width: 80,
            mode: OutputMode::Plain,
            quiet: false,
            interactive: false,
        };
        let spinner = Spinner::start(&ctx, "working");
        assert!(spinner.bar.is_none());
        assert_eq!(spinner.suspend(|| 7), 7);
        spinner.finish();
    }
}

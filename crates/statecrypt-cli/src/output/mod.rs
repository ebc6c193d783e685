//! Report rendering for the CLI.
//!
//! Every batch command prints one line per artifact plus a summary, or a
//! single JSON document with `--json`, then turns failures into an exit code.

mod json;
mod text;

use std::path::Path;

use statecrypt_core::BatchReport;

use crate::errors::CliError;
use crate::ui::UiContext;

pub use json::print_json;
pub use text::{print_check, print_status};

/// Print a batch report and fail when any artifact failed or was declined.
pub fn finish_batch(
    ui: &UiContext,
    command: &str,
    root: &Path,
    report: &BatchReport,
) -> anyhow::Result<()> {
    let ok = !report.has_failures();
    if ui.mode.is_json() {
        print_json(command, ok, report)?;
    } else {
        text::print_batch(ui, root, report);
    }

    if ok {
        Ok(())
    } else {
        Err(CliError::BatchFailed {
            failed: report.summary.failed,
            declined: report.summary.declined,
        }
        .into())
    }
}

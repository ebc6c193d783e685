//! Command handlers, one module per command group.

pub mod keys;
pub mod maintenance;
pub mod provider;
pub mod sync;

use std::path::Path;

use crate::ui::{blank_line, header, print, UiContext};

/// Print the command header unless quiet or in JSON mode.
pub(crate) fn print_header(ui: &UiContext, command: &str, root: Option<&Path>) {
    if ui.quiet || ui.mode.is_json() {
        return;
    }
    let root = root.map(|r| r.display().to_string());
    print(ui, &header(ui, command, root.as_deref()));
    blank_line(ui);
}

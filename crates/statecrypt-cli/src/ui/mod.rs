//! UI primitives for the statecrypt CLI.
//!
//! This module provides:
//! - **Context**: Environment detection (TTY, width, color, unicode, prompts)
//! - **Mode**: Output mode resolution (json, plain, pretty)
//! - **Theme**: Badge tokens and owo-colors styles
//! - **Render**: Headers, badges, key-value lines, tables, errors
//! - **Progress**: Spinner for slow backend calls
//! - **Prompt**: dialoguer confirmations and passphrase entry
//! - **Format**: Path, time and count helpers
//!
//! # Usage
//!
//! ```ignore
//! let ctx = UiContext::from_env(cli.json, cli.quiet, cli.no_color, cli.ascii, cli.no_input);
//!
//! if ctx.mode.is_json() {
//!     // Handle JSON output separately
//!     return Ok(());
//! }
//!
//! print(&ctx, &header(&ctx, "encrypt", Some(&root)));
//! print(&ctx, &badge(&ctx, Badge::Ok, "prod.tfstate encrypted"));
//! ```

mod context;
pub mod format;
mod mode;
pub mod progress;
pub mod prompt;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use mode::OutputMode;
pub use theme::Badge;

pub use progress::Spinner;
pub use prompt::PromptConfirmer;
pub use render::{badge, blank_line, header, hint, kv, print, print_error, table};

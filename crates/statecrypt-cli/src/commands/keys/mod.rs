mod export;
mod import;
mod setup;

pub use export::handle_export_key;
pub use import::handle_import_key;
pub use setup::handle_setup;

//! Statecrypt CLI - keeps Terraform/OpenTofu state encrypted in a shared repository
//!
//! This is the command-line interface for Statecrypt. It wires flags, config
//! and terminal output around the core sync workflow.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod logging;
mod output;
mod ui;

use std::io::IsTerminal;

use clap::Parser;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{keys, maintenance, provider, sync};
use crate::ui::{print_error, UiContext};

fn main() {
    let cli = Cli::parse();
    let global = &cli.global;
    let ui = UiContext::from_env(
        global.json,
        global.quiet,
        global.no_color,
        global.ascii,
        global.no_input,
    );
    logging::init(
        global.verbose,
        std::io::stderr().is_terminal() && !global.no_color,
    );

    let app = AppContext::new(global, ui);
    if let Err(err) = run(&app, &cli.command) {
        let (code, hint) = errors::classify(&err);
        tracing::debug!(code, error = ?err, "Command failed");
        print_error(app.ui(), &format!("{:#}", err), hint.as_deref());
        std::process::exit(code);
    }
}

fn run(app: &AppContext, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Encrypt(args) => sync::handle_encrypt(app, args),
        Commands::Decrypt => sync::handle_decrypt(app),
        Commands::Cleanup(args) => maintenance::handle_cleanup(app, args),
        Commands::Check => maintenance::handle_check(app),
        Commands::Status => maintenance::handle_status(app),
        Commands::Setup => keys::handle_setup(app),
        Commands::ExportKey(args) => keys::handle_export_key(app, args),
        Commands::ImportKey(args) => keys::handle_import_key(app, args),
        Commands::Doctor => maintenance::handle_doctor(app),
        Commands::InitConfig(args) => maintenance::handle_init_config(app, args),
        Commands::KeyProvider => provider::handle_key_provider(app),
    }
}

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use statecrypt_core::{KeyMode, VERSION};

use crate::config::BackendKind;

/// statecrypt - keep infrastructure state files encrypted in version control
#[derive(Parser, Debug)]
#[command(name = "statecrypt")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to the config file
    #[arg(long, global = true, env = "STATECRYPT_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory scanned for artifacts (overrides [artifacts] root)
    #[arg(long, global = true, env = "STATECRYPT_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Logical key identifier (overrides [key] id)
    #[arg(long, global = true, env = "STATECRYPT_KEY_ID", value_name = "ID")]
    pub key_id: Option<String>,

    /// Only report problems and the summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit a JSON report on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Never prompt; questions are answered "no"
    #[arg(long, global = true)]
    pub no_input: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use ASCII symbols only
    #[arg(long, global = true)]
    pub ascii: bool,

    /// More diagnostic logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encrypt every plaintext artifact into its twin
    Encrypt(EncryptArgs),

    /// Decrypt every encrypted twin; newer local plaintext is never overwritten
    Decrypt,

    /// Securely delete plaintexts that are backed by an up-to-date twin
    Cleanup(CleanupArgs),

    /// Fail when any plaintext artifact lacks an encrypted twin
    Check,

    /// Show both sides of every artifact
    Status,

    /// Create key material for the configured key id
    Setup,

    /// Export the private key as a passphrase-protected archive
    ExportKey(ExportKeyArgs),

    /// Install a shared passphrase and, in asymmetric mode, a key archive
    ImportKey(ImportKeyArgs),

    /// Diagnose configuration, backend and key material
    Doctor,

    /// Write a default config file
    InitConfig(InitConfigArgs),

    /// Act as an OpenTofu external key provider (stdin/stdout protocol)
    KeyProvider,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EncryptArgs {
    /// Overwrite newer encrypted twins without asking
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CleanupArgs {
    /// Decrypt each twin and compare before deleting
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportKeyArgs {
    /// Destination file (must not exist)
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ImportKeyArgs {
    /// Key archive produced by `export-key` (required in asymmetric mode)
    #[arg(value_name = "ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Read the shared passphrase from a file ("-" for stdin)
    #[arg(long, value_name = "PATH")]
    pub passphrase_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct InitConfigArgs {
    /// Encryption backend
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<BackendKind>,

    /// Key mode
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<KeyMode>,

    /// Replace an existing config file
    #[arg(long)]
    pub force: bool,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    value.parse().map_err(|e: crate::errors::CliError| e.to_string())
}

fn parse_mode(value: &str) -> Result<KeyMode, String> {
    value
        .parse()
        .map_err(|e: statecrypt_core::StatecryptError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "statecrypt",
            "encrypt",
            "--force",
            "--root",
            "/repo",
            "--json",
            "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Encrypt(EncryptArgs { force: true })));
        assert_eq!(cli.global.root, Some(PathBuf::from("/repo")));
        assert!(cli.global.json);
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn test_import_key_archive_is_optional() {
        let cli = Cli::try_parse_from(["statecrypt", "import-key", "--passphrase-file", "-"])
            .unwrap();
        match cli.command {
            Commands::ImportKey(args) => {
                assert!(args.archive.is_none());
                assert_eq!(args.passphrase_file, Some(PathBuf::from("-")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_init_config_values() {
        let cli = Cli::try_parse_from([
            "statecrypt",
            "init-config",
            "--backend",
            "age",
            "--mode",
            "asym",
        ])
        .unwrap();
        match cli.command {
            Commands::InitConfig(args) => {
                assert_eq!(args.backend, Some(BackendKind::Age));
                assert_eq!(args.mode, Some(KeyMode::Asymmetric));
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["statecrypt", "init-config", "--backend", "pgp"]).is_err());
    }

    #[test]
    fn test_export_key_requires_dest() {
        assert!(Cli::try_parse_from(["statecrypt", "export-key"]).is_err());
    }
}

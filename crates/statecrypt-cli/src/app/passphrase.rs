//! Where a transferred passphrase comes from during `import-key`.

use std::io::Read;
use std::path::Path;

use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::constants::env;
use crate::errors::CliError;
use crate::ui::prompt::new_passphrase;
use crate::ui::UiContext;

/// Resolve the shared passphrase.
///
/// Order: `--passphrase-file` (`-` reads stdin), `STATECRYPT_PASSPHRASE`,
/// then an interactive prompt.
pub fn read_shared_passphrase(ui: &UiContext, file: Option<&Path>) -> anyhow::Result<SecretString> {
    if let Some(path) = file {
        let mut raw = Zeroizing::new(String::new());
        if path == Path::new("-") {
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(|e| anyhow::anyhow!("Failed to read passphrase from stdin: {}", e))?;
        } else {
            std::fs::File::open(path)
                .and_then(|mut file| file.read_to_string(&mut raw))
                .map_err(|e| {
                    CliError::not_found(
                        format!("Cannot read passphrase file {}: {}", path.display(), e),
                        "Check the --passphrase-file path.",
                    )
                })?;
        }
        return from_raw(&raw);
    }

    if let Ok(value) = std::env::var(env::PASSPHRASE) {
        let value = Zeroizing::new(value);
        if !value.trim().is_empty() {
            return from_raw(&value);
        }
    }

    if !ui.interactive {
        return Err(CliError::invalid_input(format!(
            "No passphrase provided and no terminal available. Use --passphrase-file or set {}.",
            env::PASSPHRASE
        ))
        .into());
    }

    let entered = Zeroizing::new(new_passphrase("Shared passphrase")?);
    from_raw(&entered)
}

fn from_raw(raw: &str) -> anyhow::Result<SecretString> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::invalid_input("Passphrase is empty").into());
    }
    Ok(SecretString::from(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::OutputMode;
    use secrecy::ExposeSecret;
    use tempfile::tempdir;

    fn ctx() -> UiContext {
        UiContext {
            is_tty: false,
            color: false,
            unicode: false,
            width: 80,
            mode: OutputMode::Plain,
            quiet: false,
            interactive: false,
        }
    }

    #[test]
    fn test_file_contents_are_trimmed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pass");
        std::fs::write(&path, "correct horse battery\n").unwrap();

        let secret = read_shared_passphrase(&ctx(), Some(&path)).unwrap();
        assert_eq!(secret.expose_secret(), "correct horse battery");
    }

    #[test]
    fn test_missing_or_blank_file_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(read_shared_passphrase(&ctx(), Some(&dir.path().join("absent"))).is_err());

        let blank = dir.path().join("blank");
        std::fs::write(&blank, "  \n").unwrap();
        let err = read_shared_passphrase(&ctx(), Some(&blank)).unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_some());
    }
}

#![cfg(unix)]

//! GPG adapter tests against a scripted stand-in for the `gpg` binary.
//!
//! The fake prefixes ciphertexts with a header line naming the passphrase
//! (symmetric) or recipient (asymmetric), keeps its "keyring" in a plain
//! text file, and logs every argv so tests can inspect command lines.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use secrecy::SecretString;
use statecrypt_core::{
    AlwaysConfirm, ArtifactLayout, Backend, CryptRequest, GpgBackend, KeyMode, KeyStore,
    Orchestrator, Outcome, StatecryptError,
};

const FAKE_GPG: &str = r#"#!/usr/bin/env bash
set -euo pipefail
echo "$*" >> "__LOG__"
KEYS="__KEYS__"
op=""
out=""
passfile=""
recipient=""
positional=()
while [[ $# -gt 0 ]]; do
  case "$1" in
    --version) echo "gpg (GnuPG) 2.4.4-fake"; exit 0 ;;
    --homedir|--cipher-algo|--trust-model|--pinentry-mode) shift 2 ;;
    --passphrase-file) passfile="$2"; shift 2 ;;
    --output) out="$2"; shift 2 ;;
    --recipient) recipient="$2"; shift 2 ;;
    --symmetric) op="sym"; shift ;;
    --encrypt) op="asym"; shift ;;
    --decrypt) op="dec"; shift ;;
    --list-packets) op="packets"; shift ;;
    --list-secret-keys) op="haskey"; shift ;;
    --quick-generate-key) op="gen"; shift ;;
    --export-secret-keys) op="export"; shift ;;
    --import) op="import"; shift ;;
    --*) shift ;;
    *) positional+=("$1"); shift ;;
  esac
done
target="${positional[0]:-}"

case "$op" in
  sym)
    { printf 'FAKEGPG %s\n' "$(cat "$passfile")"; cat "$target"; } > "$out"
    ;;
  asym)
    if ! grep -qx "$recipient" "$KEYS"; then
      echo "gpg: $recipient: skipped: No public key" >&2
      exit 2
    fi
    { printf 'FAKEGPG-ASYM %s\n' "$recipient"; cat "$target"; } > "$out"
    ;;
  dec)
    header="$(head -n 1 "$target")"
    case "$header" in
      "FAKEGPG-ASYM "*)
        if ! grep -qx "${header#FAKEGPG-ASYM }" "$KEYS"; then
          echo "gpg: decryption failed: No secret key" >&2
          exit 2
        fi
        ;;
      "FAKEGPG "*)
        if [[ "${header#FAKEGPG }" != "$(cat "$passfile")" ]]; then
          echo "gpg: decryption failed: Bad session key" >&2
          exit 2
        fi
        ;;
      *)
        echo "gpg: no valid OpenPGP data found." >&2
        exit 2
        ;;
    esac
    tail -n +2 "$target" > "$out"
    ;;
  packets)
    header="$(head -n 1 "$target")"
    case "$header" in
      "FAKEGPG-ASYM "*) echo ":pubkey enc packet: version 3, algo 18, keyid ${header#FAKEGPG-ASYM }" ;;
      "FAKEGPG "*) echo ":symkey enc packet: version 4, cipher 9, aead 0, s2k 3" ;;
      *)
        echo "gpg: no valid OpenPGP data found." >&2
        exit 2
        ;;
    esac
    ;;
  haskey)
    grep -qx "$target" "$KEYS" || exit 2
    echo "sec:u:255:22:$target:"
    ;;
  gen)
    echo "$target" >> "$KEYS"
    ;;
  export)
    if grep -qx "$target" "$KEYS"; then
      printf 'FAKEKEY %s\n' "$target" > "$out"
    fi
    ;;
  import)
    key="$(head -n 1 "$target")"
    echo "${key#FAKEKEY }" >> "$KEYS"
    ;;
esac
"#;

struct Fixture {
    _temp: tempfile::TempDir,
    root: PathBuf,
    scratch: PathBuf,
    log: PathBuf,
    keys: PathBuf,
    backend: GpgBackend,
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    let mut permissions = fs::metadata(path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).unwrap();
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let bin_dir = temp.path().join("bin");
    let root = temp.path().join("repo");
    let scratch = temp.path().join("scratch");
    fs::create_dir_all(&bin_dir).unwrap();
    fs::create_dir_all(&root).unwrap();
    fs::create_dir_all(&scratch).unwrap();

    let log = temp.path().join("gpg.log");
    let keys = temp.path().join("keyring.txt");
    fs::write(&keys, "").unwrap();

    let gpg = bin_dir.join("gpg");
    write_script(
        &gpg,
        &FAKE_GPG
            .replace("__LOG__", &log.to_string_lossy())
            .replace("__KEYS__", &keys.to_string_lossy()),
    );

    let backend = GpgBackend::with_binary(gpg.to_string_lossy().to_string())
        .with_homedir(temp.path().join("gnupg"))
        .with_scratch_dir(&scratch);

    Fixture {
        _temp: temp,
        root,
        scratch,
        log,
        keys,
        backend,
    }
}

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

fn scratch_is_empty(fixture: &Fixture) -> bool {
    fs::read_dir(&fixture.scratch).unwrap().next().is_none()
}

#[test]
fn probe_reports_version() {
    let fx = fixture();
    assert_eq!(fx.backend.probe().unwrap(), "gpg (GnuPG) 2.4.4-fake");
}

#[test]
fn symmetric_round_trip_keeps_passphrase_off_argv() {
    let fx = fixture();
    let pass = secret("s3cret-passphrase-value");
    let plain = fx.root.join("prod.tfstate");
    let cipher = fx.root.join("prod.tfstate.gpg");
    let restored = fx.root.join("restored.tfstate");
    fs::write(&plain, b"{\"version\": 4}\n").unwrap();

    fx.backend
        .encrypt(&CryptRequest {
            input: &plain,
            output: &cipher,
            key_id: "statecrypt",
            mode: KeyMode::Symmetric,
            passphrase: &pass,
        })
        .unwrap();
    fx.backend.ensure_decryption_key(&cipher, "statecrypt").unwrap();
    fx.backend
        .decrypt(&CryptRequest {
            input: &cipher,
            output: &restored,
            key_id: "statecrypt",
            mode: KeyMode::Symmetric,
            passphrase: &pass,
        })
        .unwrap();

    assert_eq!(fs::read(&restored).unwrap(), fs::read(&plain).unwrap());

    let log = fs::read_to_string(&fx.log).unwrap();
    assert!(!log.contains("s3cret-passphrase-value"));
    assert!(log.contains("--batch --yes --quiet --pinentry-mode loopback"));
    assert!(log.contains("--symmetric --cipher-algo AES256"));
    assert!(log.contains("--passphrase-file"));
    assert!(scratch_is_empty(&fx));

    let mode = fs::metadata(&restored).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[test]
fn wrong_passphrase_is_reported_and_cleaned_up() {
    let fx = fixture();
    let plain = fx.root.join("prod.tfstate");
    let cipher = fx.root.join("prod.tfstate.gpg");
    let restored = fx.root.join("restored.tfstate");
    fs::write(&plain, b"state").unwrap();

    fx.backend
        .encrypt(&CryptRequest {
            input: &plain,
            output: &cipher,
            key_id: "statecrypt",
            mode: KeyMode::Symmetric,
            passphrase: &secret("right-passphrase"),
        })
        .unwrap();

    let err = fx
        .backend
        .decrypt(&CryptRequest {
            input: &cipher,
            output: &restored,
            key_id: "statecrypt",
            mode: KeyMode::Symmetric,
            passphrase: &secret("wrong-passphrase"),
        })
        .unwrap_err();

    assert!(matches!(err, StatecryptError::IncorrectPassphrase));
    assert!(!err.is_fatal());
    assert!(!restored.exists());
    assert!(scratch_is_empty(&fx));
}

#[test]
fn corrupt_ciphertext_is_detected_before_decrypting() {
    let fx = fixture();
    let cipher = fx.root.join("prod.tfstate.gpg");
    fs::write(&cipher, b"not a pgp message\n").unwrap();

    let err = fx
        .backend
        .ensure_decryption_key(&cipher, "statecrypt")
        .unwrap_err();
    assert!(matches!(err, StatecryptError::CorruptCiphertext(_)));
}

#[test]
fn asymmetric_flow_checks_recipient_key() {
    let fx = fixture();
    let pass = secret("keypair-passphrase");
    let plain = fx.root.join("prod.tfstate");
    let cipher = fx.root.join("prod.tfstate.gpg");
    fs::write(&plain, b"state").unwrap();

    assert!(!fx.backend.has_key("statecrypt").unwrap());
    fx.backend.generate_key("statecrypt", &pass).unwrap();
    assert!(fx.backend.has_key("statecrypt").unwrap());

    fx.backend
        .encrypt(&CryptRequest {
            input: &plain,
            output: &cipher,
            key_id: "statecrypt",
            mode: KeyMode::Asymmetric,
            passphrase: &pass,
        })
        .unwrap();
    let log = fs::read_to_string(&fx.log).unwrap();
    assert!(log.contains("--trust-model always --recipient statecrypt --encrypt"));
    assert!(log.contains("--quick-generate-key statecrypt default default never"));

    fx.backend.ensure_decryption_key(&cipher, "statecrypt").unwrap();

    // Another machine whose keyring lacks the private key fails fast.
    fs::write(&fx.keys, "").unwrap();
    let err = fx
        .backend
        .ensure_decryption_key(&cipher, "statecrypt")
        .unwrap_err();
    assert!(matches!(err, StatecryptError::MissingKey(_)));
}

#[test]
fn export_and_import_round_trip_the_keyring() {
    let fx = fixture();
    let pass = secret("keypair-passphrase");
    let archive = fx.root.join("statecrypt-key.asc");

    let err = fx
        .backend
        .export_key("statecrypt", &pass, &archive)
        .unwrap_err();
    assert!(matches!(err, StatecryptError::MissingKey(_)));
    assert!(!archive.exists());

    fx.backend.generate_key("statecrypt", &pass).unwrap();
    fx.backend.export_key("statecrypt", &pass, &archive).unwrap();
    let mode = fs::metadata(&archive).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);

    fs::write(&fx.keys, "").unwrap();
    fx.backend.import_key("statecrypt", &archive, &pass).unwrap();
    assert!(fx.backend.has_key("statecrypt").unwrap());
    assert!(scratch_is_empty(&fx));
}

#[test]
fn orchestrated_round_trip_with_gpg_suffix() {
    let fx = fixture();
    let key_dir = fx.root.parent().unwrap().join("keys");
    let store = KeyStore::new(&key_dir, "statecrypt").unwrap();
    store.get_or_create_passphrase(&mut AlwaysConfirm).unwrap();

    let layout = ArtifactLayout::new(&fx.root, fx.backend.default_suffix());
    let original: Vec<u8> = (0..500u32).map(|i| b'a' + (i % 26) as u8).collect();
    let plain = fx.root.join("prod.tfstate");
    fs::write(&plain, &original).unwrap();

    let orchestrator = Orchestrator::new(&fx.backend, &layout, &store, KeyMode::Symmetric);
    let report = orchestrator.encrypt_all(&mut AlwaysConfirm).unwrap();
    assert_eq!(report.results[0].outcome, Outcome::Encrypted);
    assert!(fx.root.join("prod.tfstate.gpg").exists());

    // Fresh checkout: only the ciphertext is present.
    fs::remove_file(&plain).unwrap();
    let report = orchestrator.decrypt_all().unwrap();
    assert_eq!(report.results[0].outcome, Outcome::Decrypted);
    assert_eq!(fs::read(&plain).unwrap(), original);
}

#[test]
fn missing_binary_aborts_the_batch() {
    let fx = fixture();
    let store = KeyStore::new(fx.root.join(".keys"), "statecrypt").unwrap();
    store.get_or_create_passphrase(&mut AlwaysConfirm).unwrap();
    fs::write(fx.root.join("prod.tfstate"), b"state").unwrap();

    let backend = GpgBackend::with_binary(fx.root.join("no-such-gpg").to_string_lossy().to_string());
    let layout = ArtifactLayout::new(&fx.root, "gpg");
    let orchestrator = Orchestrator::new(&backend, &layout, &store, KeyMode::Symmetric);

    let err = orchestrator.encrypt_all(&mut AlwaysConfirm).unwrap_err();
    assert!(matches!(err, StatecryptError::BackendNotFound(_)));
}

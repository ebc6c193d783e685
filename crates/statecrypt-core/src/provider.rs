//! OpenTofu external key provider backed by the key store.
//!
//! Protocol: write the header line, read the stored metadata (or `null`)
//! from stdin, answer with the keys and the metadata to store next to the
//! encrypted state.
//!
//! ```text
//! -> {"magic":"OpenTofu-External-Key-Provider","version":1}
//! <- null | {"external_data":{"salt":"...","key_id":"..."}}
//! -> {"keys":{"encryption_key":"...","decryption_key":"..."},"meta":{"external_data":{...}}}
//! ```

use std::fmt;
use std::io::{Read, Write};

use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::error::{Result, StatecryptError};
use crate::keystore::KeyStore;

/// Magic string of the protocol header.
pub const PROVIDER_MAGIC: &str = "OpenTofu-External-Key-Provider";

/// Protocol version spoken by this provider.
pub const PROVIDER_VERSION: u32 = 1;

/// Argon2id parameters.
///
/// - Memory: 64 MB (64 * 1024 KB)
/// - Iterations: 3
/// - Parallelism: 1
const ARGON2_MEMORY_KB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 1;

/// Length of derived keys in bytes (AES-256).
const KEY_LENGTH: usize = 32;

/// Length of the random salt stored in the metadata.
const SALT_LENGTH: usize = 16;

#[derive(Debug, Serialize)]
struct Header {
    magic: &'static str,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderInput {
    external_data: ExternalData,
}

/// Metadata OpenTofu stores alongside the encrypted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalData {
    pub salt: String,
    pub key_id: String,
}

#[derive(Debug, Serialize)]
struct ProviderOutput {
    keys: Keys,
    meta: Meta,
}

#[derive(Serialize)]
struct Keys {
    encryption_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decryption_key: Option<String>,
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("encryption_key", &"[REDACTED]")
            .field("decryption_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Meta {
    external_data: ExternalData,
}

/// A key derived from the stored passphrase, zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive a key from a passphrase using Argon2id.
///
/// Same passphrase and salt always produce the same key.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Result<DerivedKey> {
    if passphrase.is_empty() {
        return Err(StatecryptError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if salt.len() < SALT_LENGTH {
        return Err(StatecryptError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            SALT_LENGTH
        )));
    }

    let params = argon2::Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LENGTH),
    )
    .map_err(|e| StatecryptError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| StatecryptError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey { key })
}

/// Speak one round of the key provider protocol.
///
/// # Errors
///
/// - `InvalidInput` for malformed input or metadata for another key id
/// - Fatal `KeyStore` errors when no passphrase is stored
pub fn serve(keys: &KeyStore, mut input: impl Read, mut output: impl Write) -> Result<()> {
    let header = Header {
        magic: PROVIDER_MAGIC,
        version: PROVIDER_VERSION,
    };
    serde_json::to_writer(&mut output, &header)?;
    output.write_all(b"\n")?;
    output.flush()?;

    let mut raw = String::new();
    input.read_to_string(&mut raw)?;
    let request = parse_input(&raw)?;

    let passphrase = keys.passphrase()?;
    let decryption_key = match &request {
        Some(stored) => {
            if stored.external_data.key_id != keys.key_id() {
                return Err(StatecryptError::InvalidInput(format!(
                    "State was encrypted with key '{}', but the configured key is '{}'",
                    stored.external_data.key_id,
                    keys.key_id()
                )));
            }
            let salt = STANDARD
                .decode(stored.external_data.salt.as_bytes())
                .map_err(|e| StatecryptError::InvalidInput(format!("Invalid salt: {}", e)))?;
            let key = derive_key(passphrase.expose_secret(), &salt)?;
            Some(STANDARD.encode(key.as_bytes()))
        }
        None => None,
    };

    let mut salt = [0u8; SALT_LENGTH];
    getrandom::getrandom(&mut salt).map_err(|e| StatecryptError::RandomSource(e.to_string()))?;
    let encryption_key = derive_key(passphrase.expose_secret(), &salt)?;

    let response = ProviderOutput {
        keys: Keys {
            encryption_key: STANDARD.encode(encryption_key.as_bytes()),
            decryption_key,
        },
        meta: Meta {
            external_data: ExternalData {
                salt: STANDARD.encode(salt),
                key_id: keys.key_id().to_owned(),
            },
        },
    };
    serde_json::to_writer(&mut output, &response)?;
    output.write_all(b"\n")?;
    output.flush()?;
    tracing::debug!(
        key_id = keys.key_id(),
        decrypting = response.keys.decryption_key.is_some(),
        "Served key provider request"
    );
    Ok(())
}

fn parse_input(raw: &str) -> Result<Option<ProviderInput>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<Option<ProviderInput>>(trimmed)
        .map_err(|e| StatecryptError::InvalidInput(format!("Malformed provider input: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn store_with_passphrase(dir: &std::path::Path) -> KeyStore {
        let store = KeyStore::new(dir, "statecrypt").unwrap();
        fs::write(store.passphrase_path(), "provider-test-passphrase").unwrap();
        store
    }

    fn run(store: &KeyStore, input: &str) -> Result<(serde_json::Value, serde_json::Value)> {
        let mut out = Vec::new();
        serve(store, input.as_bytes(), &mut out)?;
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let header = serde_json::from_str(lines.next().unwrap()).unwrap();
        let body = serde_json::from_str(lines.next().unwrap()).unwrap();
        Ok((header, body))
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = b"unique-salt-16bytes!";
        let a = derive_key("passphrase-one", salt).unwrap();
        let b = derive_key("passphrase-one", salt).unwrap();
        let c = derive_key("passphrase-two", salt).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
        assert!(format!("{:?}", a).contains("REDACTED"));
    }

    #[test]
    fn test_derive_key_rejects_short_salt() {
        assert!(matches!(
            derive_key("passphrase", b"short"),
            Err(StatecryptError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_state_gets_encryption_key_only() {
        let dir = tempdir().unwrap();
        let store = store_with_passphrase(dir.path());

        let (header, body) = run(&store, "null").unwrap();
        assert_eq!(header["magic"], PROVIDER_MAGIC);
        assert_eq!(header["version"], 1);

        let key = STANDARD
            .decode(body["keys"]["encryption_key"].as_str().unwrap())
            .unwrap();
        assert_eq!(key.len(), KEY_LENGTH);
        assert!(body["keys"].get("decryption_key").is_none());
        assert_eq!(body["meta"]["external_data"]["key_id"], "statecrypt");
    }

    #[test]
    fn test_stored_meta_reproduces_previous_key() {
        let dir = tempdir().unwrap();
        let store = store_with_passphrase(dir.path());

        let (_, first) = run(&store, "null").unwrap();
        let meta = serde_json::json!({ "external_data": first["meta"]["external_data"] });
        let (_, second) = run(&store, &meta.to_string()).unwrap();

        assert_eq!(second["keys"]["decryption_key"], first["keys"]["encryption_key"]);
        // Fresh salt for the next encryption.
        assert_ne!(
            second["meta"]["external_data"]["salt"],
            first["meta"]["external_data"]["salt"]
        );
    }

    #[test]
    fn test_foreign_key_id_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_with_passphrase(dir.path());
        let input = r#"{"external_data":{"salt":"AAAAAAAAAAAAAAAAAAAAAA==","key_id":"other"}}"#;

        let mut out = Vec::new();
        let err = serve(&store, input.as_bytes(), &mut out).unwrap_err();
        assert!(matches!(err, StatecryptError::InvalidInput(_)));
        // Header still went out first.
        assert!(String::from_utf8(out).unwrap().contains(PROVIDER_MAGIC));
    }
}

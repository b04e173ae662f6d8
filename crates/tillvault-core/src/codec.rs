use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::error::{Result, VaultError};
use crate::payload::BackupPayload;

/// Algorithm tag written into encrypted envelopes. Unknown tags must fail
/// cleanly on open, never fall through to a byte-level misread.
pub const ALGORITHM_AES_256_GCM: &str = "aes-256-gcm";

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// The sealed wire form of a [`BackupPayload`].
///
/// Plaintext envelopes carry the serialized payload as a JSON object in
/// `data`; encrypted envelopes carry a base64 string of
/// `[32-byte salt][12-byte nonce][ciphertext + 16-byte tag]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub encrypted: bool,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| VaultError::Format(e.to_string()))
    }
}

/// Seals and unseals snapshot payloads. Constructed once at startup with an
/// injected clock; never an ambient singleton.
pub struct Codec {
    clock: Arc<dyn Clock>,
}

impl Codec {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Seal a payload into an envelope. With encryption enabled a
    /// passphrase is required; the key is derived per envelope with a fresh
    /// random salt, and the nonce is freshly generated per call so it is
    /// never reused under the same key.
    pub fn seal(
        &self,
        payload: &BackupPayload,
        encryption_enabled: bool,
        passphrase: Option<&str>,
    ) -> Result<Envelope> {
        let timestamp = self.clock.now();

        if !encryption_enabled {
            return Ok(Envelope {
                encrypted: false,
                data: serde_json::to_value(payload)?,
                algorithm: None,
                timestamp,
            });
        }

        let passphrase = passphrase.ok_or_else(|| {
            VaultError::Encryption("encryption enabled but no passphrase provided".into())
        })?;

        let plaintext = Zeroizing::new(serde_json::to_vec(payload)?);

        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let key = derive_key(passphrase, &salt)?;

        let cipher = Aes256Gcm::new_from_slice(key.as_ref())
            .map_err(|e| VaultError::Encryption(format!("cipher init: {e}")))?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| VaultError::Encryption(format!("AES-GCM encrypt: {e}")))?;

        // Blob layout: [salt][nonce][ciphertext+tag], base64 on the wire.
        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(Envelope {
            encrypted: true,
            data: serde_json::Value::String(BASE64.encode(blob)),
            algorithm: Some(ALGORITHM_AES_256_GCM.to_string()),
            timestamp,
        })
    }

    /// Unseal an envelope back into its payload. Fails with
    /// [`VaultError::DecryptionFailed`] on tag mismatch and
    /// [`VaultError::Format`] on missing fields or an unknown algorithm.
    pub fn open(&self, envelope: &Envelope, passphrase: Option<&str>) -> Result<BackupPayload> {
        let payload: BackupPayload = if envelope.encrypted {
            match envelope.algorithm.as_deref() {
                Some(ALGORITHM_AES_256_GCM) => {}
                Some(other) => {
                    return Err(VaultError::Format(format!(
                        "unrecognized envelope algorithm '{other}'"
                    )))
                }
                None => {
                    return Err(VaultError::Format(
                        "encrypted envelope is missing the algorithm field".into(),
                    ))
                }
            }

            let encoded = envelope.data.as_str().ok_or_else(|| {
                VaultError::Format("encrypted envelope data must be a base64 string".into())
            })?;
            let blob = BASE64
                .decode(encoded)
                .map_err(|e| VaultError::Format(format!("envelope data is not base64: {e}")))?;
            if blob.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
                return Err(VaultError::DecryptionFailed);
            }

            let passphrase = passphrase.ok_or_else(|| {
                VaultError::Config("a passphrase is required to open this envelope".into())
            })?;

            let (salt, rest) = blob.split_at(SALT_LEN);
            let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
            let key = derive_key(passphrase, salt)?;

            let cipher = Aes256Gcm::new_from_slice(key.as_ref())
                .map_err(|_| VaultError::DecryptionFailed)?;
            let plaintext = Zeroizing::new(
                cipher
                    .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                    .map_err(|_| VaultError::DecryptionFailed)?,
            );

            serde_json::from_slice(&plaintext)
                .map_err(|e| VaultError::Format(format!("invalid payload: {e}")))?
        } else {
            serde_json::from_value(envelope.data.clone())
                .map_err(|e| VaultError::Format(format!("invalid payload: {e}")))?
        };

        if payload.version.is_empty() {
            return Err(VaultError::Format("payload is missing a version".into()));
        }
        if payload.data.is_null() {
            return Err(VaultError::Format("payload carries no state data".into()));
        }
        Ok(payload)
    }
}

/// Derive a 32-byte key from a passphrase using Argon2id (t=3, m=64 MiB,
/// p=4), the same work factor the rest of our tooling uses.
fn derive_key(passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let params = argon2::Params::new(65536, 3, 4, Some(32))
        .map_err(|e| VaultError::KeyDerivation(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, output.as_mut())
        .map_err(|e| VaultError::KeyDerivation(format!("argon2 hash: {e}")))?;
    Ok(output)
}

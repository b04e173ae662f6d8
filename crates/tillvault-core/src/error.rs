use thiserror::Error;

use crate::ops::OperationKind;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no application state to snapshot")]
    NoData,

    #[error("malformed envelope: {0}")]
    Format(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: wrong passphrase or corrupted data")]
    DecryptionFailed,

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("backend '{backend_id}' error: {cause}")]
    Provider { backend_id: String, cause: String },

    #[error("retention cleanup error: {0}")]
    Retention(String),

    #[error("a {0} operation is already in flight")]
    Busy(OperationKind),

    #[error("unknown backend: '{0}'")]
    UnknownBackend(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

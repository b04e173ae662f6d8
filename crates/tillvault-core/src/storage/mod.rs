pub mod local_backend;
pub mod rest_backend;

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::Envelope;
use crate::error::{Result, VaultError};
use crate::payload::BackupType;

pub use local_backend::LocalBackend;
pub use rest_backend::RestBackend;

/// Registry identifier of the local file backend.
pub const LOCAL_BACKEND_ID: &str = "local";

/// Timeout applied to every remote backend call. A timeout surfaces as a
/// provider error, never a hang.
pub const BACKEND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Backend-assigned identifier for later download.
    pub id: String,
    /// Human-usable locator (file path, URL), if the backend has one.
    pub locator: Option<String>,
}

/// A pluggable storage destination. Upload must be all-or-nothing from the
/// caller's perspective: a receipt is only returned for a confirmed write.
pub trait StorageBackend: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> BackupType;
    fn upload(&self, envelope: &Envelope, name: &str) -> Result<UploadReceipt>;
    fn download(&self, id: &str) -> Result<Envelope>;
}

/// Lookup table of backends keyed by identifier, built once at startup.
/// Core code resolves a destination with a single `get` and never inspects
/// backend internals.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn StorageBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn StorageBackend>) {
        self.backends.insert(backend.id().to_string(), backend);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn StorageBackend>> {
        self.backends
            .get(id)
            .cloned()
            .ok_or_else(|| VaultError::UnknownBackend(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Wrap backend-specific error detail into the uniform provider error the
/// orchestrators see.
pub(crate) fn provider_error(backend_id: &str, cause: impl std::fmt::Display) -> VaultError {
    VaultError::Provider {
        backend_id: backend_id.to_string(),
        cause: cause.to_string(),
    }
}

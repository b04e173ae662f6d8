use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::codec::Envelope;
use crate::error::{Result, VaultError};
use crate::payload::BackupType;
use crate::storage::{provider_error, StorageBackend, UploadReceipt, LOCAL_BACKEND_ID};

/// Local file backend: one JSON envelope file per backup under a root
/// directory, written atomically via temp-file + rename.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: fs::canonicalize(root)?,
        })
    }

    /// Reject names that could escape the backup directory.
    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(VaultError::Format("unsafe backup name: empty".into()));
        }
        if name.starts_with('/') || name.starts_with('\\') || name.contains('\\') {
            return Err(VaultError::Format(format!("unsafe backup name: '{name}'")));
        }
        for component in Path::new(name).components() {
            if component == Component::ParentDir {
                return Err(VaultError::Format(format!(
                    "unsafe backup name: parent traversal '{name}'"
                )));
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        Self::validate_name(name)?;
        Ok(self.root.join(format!("{name}.json")))
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Materialize a stored envelope as a user-downloadable file. An I/O
    /// convenience on top of the backend, not part of the upload/download
    /// contract.
    pub fn export_file(&self, id: &str, dest: &Path) -> Result<()> {
        let src = self.resolve(id)?;
        fs::copy(&src, dest).map_err(|e| provider_error(LOCAL_BACKEND_ID, e))?;
        Ok(())
    }

    /// Ingest a user-uploaded envelope file, parsing and returning it for
    /// validation by the caller. Nothing is written.
    pub fn import_file(path: &Path) -> Result<Envelope> {
        let bytes = fs::read(path)?;
        Envelope::from_bytes(&bytes)
    }
}

impl StorageBackend for LocalBackend {
    fn id(&self) -> &str {
        LOCAL_BACKEND_ID
    }

    fn kind(&self) -> BackupType {
        BackupType::Local
    }

    fn upload(&self, envelope: &Envelope, name: &str) -> Result<UploadReceipt> {
        let path = self.resolve(name)?;
        let bytes = envelope.to_bytes()?;
        self.atomic_write(&path, &bytes)
            .map_err(|e| provider_error(LOCAL_BACKEND_ID, e))?;
        Ok(UploadReceipt {
            id: name.to_string(),
            locator: Some(path.display().to_string()),
        })
    }

    fn download(&self, id: &str) -> Result<Envelope> {
        let path = self.resolve(id)?;
        let bytes = fs::read(&path).map_err(|e| provider_error(LOCAL_BACKEND_ID, e))?;
        Envelope::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_envelope() -> Envelope {
        Envelope {
            encrypted: false,
            data: serde_json::json!({"version": "1.0"}),
            algorithm: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn validate_name_rejects_unsafe_names() {
        assert!(LocalBackend::validate_name("").is_err());
        assert!(LocalBackend::validate_name("/abs").is_err());
        assert!(LocalBackend::validate_name("..\\win").is_err());
        assert!(LocalBackend::validate_name("../escape").is_err());
        assert!(LocalBackend::validate_name("a/../../b").is_err());
    }

    #[test]
    fn upload_then_download_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        let envelope = sample_envelope();
        let receipt = backend.upload(&envelope, "20260101T020000Z-ab12").unwrap();
        assert_eq!(receipt.id, "20260101T020000Z-ab12");

        let downloaded = backend.download(&receipt.id).unwrap();
        assert_eq!(downloaded.data, envelope.data);
        assert!(!downloaded.encrypted);
    }

    #[test]
    fn download_missing_id_is_a_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        let err = backend.download("nothing").unwrap_err();
        assert!(matches!(err, VaultError::Provider { ref backend_id, .. } if backend_id == "local"));
    }

    #[test]
    fn export_and_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path()).unwrap();
        let envelope = sample_envelope();
        backend.upload(&envelope, "snap").unwrap();

        let out = dir.path().join("exported.json");
        backend.export_file("snap", &out).unwrap();

        let imported = LocalBackend::import_file(&out).unwrap();
        assert_eq!(imported.data, envelope.data);
    }

    #[test]
    fn import_rejects_non_envelope_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.json");
        std::fs::write(&path, b"not an envelope").unwrap();
        assert!(matches!(
            LocalBackend::import_file(&path),
            Err(VaultError::Format(_))
        ));
    }
}

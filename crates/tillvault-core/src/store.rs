use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::error::{Result, VaultError};

/// Storage keys used by this subsystem. The application-state document and
/// the history ledger live under distinct keys so a restore never clobbers
/// the record of past backups.
pub mod keys {
    pub const APP_STATE: &str = "app_state";
    pub const HISTORY: &str = "backup_history";
    pub const LAST_BACKUP_TIME: &str = "last_backup_time";
}

/// Durable keyed document store. Consumed, not owned, by this subsystem:
/// the surrounding application decides where state actually lives.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed state store: one JSON document per key under a root
/// directory, written atomically so readers never observe a partial file.
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: fs::canonicalize(root)?,
        })
    }

    /// Reject keys that could escape the store root.
    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(VaultError::Config("unsafe storage key: empty".into()));
        }
        if key.starts_with('/') || key.starts_with('\\') || key.contains('\\') {
            return Err(VaultError::Config(format!(
                "unsafe storage key: '{key}'"
            )));
        }
        for component in Path::new(key).components() {
            if component == Component::ParentDir {
                return Err(VaultError::Config(format!(
                    "unsafe storage key: parent traversal '{key}'"
                )));
            }
        }
        Ok(())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }

    /// Write to a temp file in the same directory, then rename into place.
    fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.resolve(key)?;
        self.atomic_write(&path, &serde_json::to_vec(value)?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_key_rejects_unsafe_keys() {
        assert!(FileStateStore::validate_key("").is_err());
        assert!(FileStateStore::validate_key("/etc/passwd").is_err());
        assert!(FileStateStore::validate_key("..\\escape").is_err());
        assert!(FileStateStore::validate_key("../outside").is_err());
        assert!(FileStateStore::validate_key("a/../../b").is_err());
    }

    #[test]
    fn validate_key_accepts_safe_keys() {
        assert!(FileStateStore::validate_key(keys::APP_STATE).is_ok());
        assert!(FileStateStore::validate_key(keys::HISTORY).is_ok());
        assert!(FileStateStore::validate_key(keys::LAST_BACKUP_TIME).is_ok());
    }

    #[test]
    fn get_returns_none_for_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path()).unwrap();
        assert!(store.get("nothing_here").unwrap().is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path()).unwrap();
        let doc = serde_json::json!({"products": [1, 2, 3], "branch": "main"});
        store.set(keys::APP_STATE, &doc).unwrap();
        assert_eq!(store.get(keys::APP_STATE).unwrap().unwrap(), doc);
    }

    #[test]
    fn set_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path()).unwrap();
        store.set("doc", &serde_json::json!({"v": 1})).unwrap();
        store.set("doc", &serde_json::json!({"v": 2})).unwrap();
        assert_eq!(
            store.get("doc").unwrap().unwrap(),
            serde_json::json!({"v": 2})
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path()).unwrap();
        store.set("doc", &serde_json::json!(true)).unwrap();
        store.remove("doc").unwrap();
        store.remove("doc").unwrap();
        assert!(store.get("doc").unwrap().is_none());
    }
}

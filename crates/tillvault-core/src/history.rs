use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::payload::{BackupMetadata, BackupType};
use crate::store::{keys, StateStore};

/// Hard global cap on ledger length. Separate from the policy-driven
/// retention cap, which only applies to auto-backup records.
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// One completed backup operation. Write-once: records are only ever
/// appended and deleted, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub size_bytes: u64,
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_url: Option<String>,
    pub metadata: BackupMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only records created by the scheduler.
    pub auto_only: bool,
    pub backup_type: Option<BackupType>,
}

impl HistoryFilter {
    fn matches(&self, record: &BackupRecord) -> bool {
        if self.auto_only && !record.metadata.is_auto() {
            return false;
        }
        if let Some(t) = self.backup_type {
            if record.backup_type != t {
                return false;
            }
        }
        true
    }
}

/// Append-mostly, capacity-bounded record of past backups, persisted under
/// a storage key distinct from the application state it describes.
pub struct HistoryLedger {
    store: Arc<dyn StateStore>,
    cap: usize,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_cap(store, DEFAULT_HISTORY_CAP)
    }

    pub fn with_cap(store: Arc<dyn StateStore>, cap: usize) -> Self {
        Self { store, cap }
    }

    fn load(&self) -> Result<Vec<BackupRecord>> {
        match self.store.get(keys::HISTORY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    fn persist(&self, records: &[BackupRecord]) -> Result<()> {
        self.store
            .set(keys::HISTORY, &serde_json::to_value(records)?)
    }

    /// Insert a record in most-recent-first order, truncating the oldest
    /// entries once the hard cap is exceeded (regardless of auto_backup).
    pub fn append(&self, record: BackupRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(self.cap);
        self.persist(&records)
    }

    /// List records, most recent first.
    pub fn list(&self, filter: Option<&HistoryFilter>) -> Result<Vec<BackupRecord>> {
        let records = self.load()?;
        match filter {
            Some(f) => Ok(records.into_iter().filter(|r| f.matches(r)).collect()),
            None => Ok(records),
        }
    }

    pub fn find(&self, id: &str) -> Result<Option<BackupRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.id == id))
    }

    /// Delete by id. Returns whether a record was actually removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.persist(&records)?;
        Ok(true)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.load()?.is_empty())
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Frequency;

/// Current payload format version. Bump on incompatible layout changes.
pub const PAYLOAD_VERSION: &str = "1.0";

/// Metadata label marking the safety snapshot taken before a restore.
pub const PRE_RESTORE_LABEL: &str = "preRestore";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Local,
    Cloud,
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupType::Local => write!(f, "local"),
            BackupType::Cloud => write!(f, "cloud"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub app_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Set when the scheduler (or a forced scheduler run) created the
    /// backup; retention cleanup only ever touches records with this set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_backup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    /// Free-form marker, e.g. [`PRE_RESTORE_LABEL`] for safety snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BackupMetadata {
    pub fn is_auto(&self) -> bool {
        self.auto_backup == Some(true)
    }
}

/// The full application-state snapshot plus versioning metadata, before
/// sealing. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Opaque application-state document, carried wholesale.
    pub data: serde_json::Value,
    pub metadata: BackupMetadata,
}

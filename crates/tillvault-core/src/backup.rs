use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::clock::Clock;
use crate::codec::Codec;
use crate::config::{Destinations, Frequency};
use crate::error::{Result, VaultError};
use crate::history::{BackupRecord, HistoryLedger};
use crate::notify::Notifier;
use crate::ops::{InflightGuard, OperationKind};
use crate::payload::{BackupMetadata, BackupPayload, BackupType, PAYLOAD_VERSION};
use crate::storage::BackendRegistry;
use crate::store::{keys, StateStore};

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub encryption_enabled: bool,
    pub passphrase: Option<String>,
    /// Set by the scheduler (including forced runs); manual backups leave
    /// this false so retention cleanup never touches them.
    pub auto_backup: bool,
    pub frequency: Option<Frequency>,
    pub label: Option<String>,
}

/// Per-destination result of a backup run. Destinations fail
/// independently; callers see partial success rather than a rollback.
#[derive(Debug)]
pub enum DestinationOutcome {
    Stored(BackupRecord),
    Failed {
        backend_id: String,
        error: VaultError,
    },
}

impl DestinationOutcome {
    pub fn record(&self) -> Option<&BackupRecord> {
        match self {
            DestinationOutcome::Stored(r) => Some(r),
            DestinationOutcome::Failed { .. } => None,
        }
    }
}

/// Snapshots current application state, seals it, writes it to each
/// requested destination, and appends one history record per confirmed
/// write.
pub struct BackupOrchestrator {
    store: Arc<dyn StateStore>,
    registry: Arc<BackendRegistry>,
    history: Arc<HistoryLedger>,
    codec: Codec,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    guard: Arc<InflightGuard>,
    app_version: String,
}

impl BackupOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn StateStore>,
        registry: Arc<BackendRegistry>,
        history: Arc<HistoryLedger>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        guard: Arc<InflightGuard>,
        app_version: &str,
    ) -> Self {
        Self {
            store,
            registry,
            history,
            codec: Codec::new(Arc::clone(&clock)),
            clock,
            notifier,
            guard,
            app_version: app_version.to_string(),
        }
    }

    /// Run a backup against the configured destinations. Claims the
    /// in-flight guard; an overlapping backup or restore is rejected with
    /// `Busy` before anything is read.
    pub fn run_backup(
        &self,
        destinations: &Destinations,
        options: &BackupOptions,
    ) -> Result<Vec<DestinationOutcome>> {
        let _permit = self.guard.try_begin(OperationKind::Backup)?;
        self.run_backup_unguarded(destinations, options)
    }

    /// Guard-free variant for callers that already hold the state resource
    /// (the restore orchestrator's safety snapshot).
    pub(crate) fn run_backup_unguarded(
        &self,
        destinations: &Destinations,
        options: &BackupOptions,
    ) -> Result<Vec<DestinationOutcome>> {
        if destinations.is_empty() {
            return Err(VaultError::Config("no backup destinations requested".into()));
        }

        let state = match self.store.get(keys::APP_STATE) {
            Ok(Some(state)) => state,
            Ok(None) => {
                self.notifier
                    .notify_failure("backup", "no application state to snapshot");
                return Err(VaultError::NoData);
            }
            Err(e) => return Err(e),
        };

        let mut outcomes = Vec::new();
        for backend_id in destinations.backend_ids() {
            match self.backup_to(&backend_id, &state, options) {
                Ok(record) => {
                    tracing::info!(
                        backend = %backend_id,
                        record = %record.id,
                        size = record.size_bytes,
                        "backup stored"
                    );
                    outcomes.push(DestinationOutcome::Stored(record));
                }
                Err(error) => {
                    tracing::warn!(backend = %backend_id, error = %error, "backup destination failed");
                    self.notifier.notify_failure(
                        "backup",
                        &format!("destination '{backend_id}' failed: {error}"),
                    );
                    outcomes.push(DestinationOutcome::Failed { backend_id, error });
                }
            }
        }

        let stored = outcomes.iter().filter(|o| o.record().is_some()).count();
        if stored > 0 {
            self.notifier.notify_success(
                "backup",
                &format!("backup completed for {stored} of {} destinations", outcomes.len()),
            );
        }
        Ok(outcomes)
    }

    /// Seal and write one destination. The history record is appended only
    /// after the backend has confirmed the write, so the ledger never holds
    /// phantom entries.
    fn backup_to(
        &self,
        backend_id: &str,
        state: &serde_json::Value,
        options: &BackupOptions,
    ) -> Result<BackupRecord> {
        let backend = self.registry.get(backend_id)?;
        let now = self.clock.now();
        let id = generate_backup_id(now);

        let payload = BackupPayload {
            version: PAYLOAD_VERSION.to_string(),
            timestamp: now,
            backup_type: backend.kind(),
            provider: match backend.kind() {
                BackupType::Cloud => Some(backend.id().to_string()),
                BackupType::Local => None,
            },
            data: state.clone(),
            metadata: BackupMetadata {
                app_version: self.app_version.clone(),
                user_agent: None,
                auto_backup: options.auto_backup.then_some(true),
                frequency: options.frequency,
                label: options.label.clone(),
            },
        };

        let envelope = self
            .codec
            .seal(&payload, options.encryption_enabled, options.passphrase.as_deref())?;
        let size_bytes = envelope.to_bytes()?.len() as u64;

        let receipt = backend.upload(&envelope, &id)?;

        let record = BackupRecord {
            id,
            backup_type: backend.kind(),
            provider: payload.provider.clone(),
            timestamp: now,
            size_bytes,
            encrypted: envelope.encrypted,
            cloud_file_id: match backend.kind() {
                BackupType::Cloud => Some(receipt.id.clone()),
                BackupType::Local => None,
            },
            cloud_url: match backend.kind() {
                BackupType::Cloud => receipt.locator.clone(),
                BackupType::Local => None,
            },
            metadata: payload.metadata.clone(),
        };
        self.history.append(record.clone())?;
        Ok(record)
    }
}

/// Timestamped identifier doubling as the stored object name, e.g.
/// `20260829T020000Z-9f3a2c1d`.
fn generate_backup_id(now: DateTime<Utc>) -> String {
    let mut buf = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut buf);
    format!("{}-{}", now.format("%Y%m%dT%H%M%SZ"), hex::encode(buf))
}

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backup::{BackupOptions, BackupOrchestrator, DestinationOutcome};
use crate::clock::Clock;
use crate::codec::{Codec, Envelope};
use crate::config::Destinations;
use crate::error::{Result, VaultError};
use crate::history::BackupRecord;
use crate::notify::Notifier;
use crate::ops::{InflightGuard, OperationKind};
use crate::payload::PRE_RESTORE_LABEL;
use crate::store::{keys, StateStore};

/// Phases of a restore. Nothing before `Applying` is permitted to have any
/// observable effect on live application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    Validating,
    SafetySnapshot,
    Applying,
    AwaitingReload,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub skip_safety_backup: bool,
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestoreResult {
    pub restored_version: String,
    pub restored_timestamp: DateTime<Utc>,
    /// Safety snapshot taken of the pre-restore state, when one was made.
    pub safety_record: Option<BackupRecord>,
    /// Always true: the session must fully reload to pick up the new state.
    pub reload_required: bool,
}

/// Validates an incoming envelope, snapshots the current state, then
/// atomically replaces it. Fail-safe by construction: any error before the
/// apply step leaves live state byte-for-byte unchanged.
pub struct RestoreOrchestrator {
    store: Arc<dyn StateStore>,
    backup: Arc<BackupOrchestrator>,
    codec: Codec,
    notifier: Arc<dyn Notifier>,
    guard: Arc<InflightGuard>,
}

impl RestoreOrchestrator {
    pub fn new(
        store: Arc<dyn StateStore>,
        backup: Arc<BackupOrchestrator>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        guard: Arc<InflightGuard>,
    ) -> Self {
        Self {
            store,
            backup,
            codec: Codec::new(clock),
            notifier,
            guard,
        }
    }

    pub fn restore(&self, envelope: &Envelope, options: &RestoreOptions) -> Result<RestoreResult> {
        let _permit = self.guard.try_begin(OperationKind::Restore)?;
        match self.restore_inner(envelope, options) {
            Ok(result) => {
                self.notifier.notify_success(
                    "restore",
                    &format!(
                        "restored snapshot from {} (version {}); reload required",
                        result.restored_timestamp, result.restored_version
                    ),
                );
                Ok(result)
            }
            Err(e) => {
                self.notifier.notify_failure("restore", &e.to_string());
                Err(e)
            }
        }
    }

    fn restore_inner(
        &self,
        envelope: &Envelope,
        options: &RestoreOptions,
    ) -> Result<RestoreResult> {
        tracing::debug!(phase = ?RestorePhase::Validating, "restore starting");
        let payload = self.codec.open(envelope, options.passphrase.as_deref())?;

        let safety_record = if options.skip_safety_backup {
            None
        } else {
            tracing::debug!(phase = ?RestorePhase::SafetySnapshot, "taking safety snapshot");
            self.take_safety_snapshot()?
        };

        tracing::debug!(phase = ?RestorePhase::Applying, "replacing application state");
        self.store.set(keys::APP_STATE, &payload.data)?;

        tracing::debug!(phase = ?RestorePhase::AwaitingReload, "restore applied");
        Ok(RestoreResult {
            restored_version: payload.version,
            restored_timestamp: payload.timestamp,
            safety_record,
            reload_required: true,
        })
    }

    /// Back up the current state to the local backend before overwriting
    /// it. Must succeed for the restore to proceed, with one exception:
    /// when there is no current state at all there is nothing to protect,
    /// and the restore continues without a safety record.
    fn take_safety_snapshot(&self) -> Result<Option<BackupRecord>> {
        let options = BackupOptions {
            label: Some(PRE_RESTORE_LABEL.to_string()),
            ..Default::default()
        };
        let outcomes = match self
            .backup
            .run_backup_unguarded(&Destinations::local_only(), &options)
        {
            Ok(outcomes) => outcomes,
            Err(VaultError::NoData) => {
                tracing::info!("no existing state; restoring without a safety snapshot");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut failure: Option<VaultError> = None;
        for outcome in outcomes {
            match outcome {
                DestinationOutcome::Stored(record) => return Ok(Some(record)),
                DestinationOutcome::Failed { error, .. } => failure = Some(error),
            }
        }
        Err(failure.unwrap_or_else(|| {
            VaultError::Config("safety snapshot produced no outcome".into())
        }))
    }
}

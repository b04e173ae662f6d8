use std::path::Path;
use std::sync::Arc;

use tillvault_core::backup::{BackupOptions, BackupOrchestrator};
use tillvault_core::clock::{Clock, SystemClock};
use tillvault_core::config::Destinations;
use tillvault_core::error::VaultError;
use tillvault_core::history::HistoryLedger;
use tillvault_core::notify::{LogNotifier, Notifier};
use tillvault_core::ops::InflightGuard;
use tillvault_core::restore::{RestoreOptions, RestoreOrchestrator};
use tillvault_core::storage::{BackendRegistry, LocalBackend, StorageBackend};
use tillvault_core::store::{keys, FileStateStore, StateStore};

struct Harness {
    store: Arc<dyn StateStore>,
    local: Arc<LocalBackend>,
    history: Arc<HistoryLedger>,
    backup: Arc<BackupOrchestrator>,
    restore: RestoreOrchestrator,
}

fn harness(data_dir: &Path, backup_dir: &Path) -> Harness {
    let store: Arc<dyn StateStore> = Arc::new(FileStateStore::new(data_dir).unwrap());
    let local = Arc::new(LocalBackend::new(backup_dir).unwrap());
    let mut registry = BackendRegistry::new();
    registry.register(Arc::clone(&local) as Arc<dyn StorageBackend>);
    let registry = Arc::new(registry);

    let history = Arc::new(HistoryLedger::new(Arc::clone(&store)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let guard = Arc::new(InflightGuard::new());

    let backup = Arc::new(BackupOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&history),
        Arc::clone(&clock),
        Arc::clone(&notifier),
        Arc::clone(&guard),
        "2.4.0",
    ));
    let restore = RestoreOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&backup),
        clock,
        notifier,
        guard,
    );

    Harness {
        store,
        local,
        history,
        backup,
        restore,
    }
}

fn pos_state(label: &str) -> serde_json::Value {
    serde_json::json!({
        "branch": label,
        "users": [{"id": 1, "role": "manager"}],
        "products": [{"sku": "LAT-01", "price": 420}],
        "invoices": [{"no": 1001, "total": 840}],
    })
}

#[test]
fn backup_export_import_restore_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(&tmp.path().join("data"), &tmp.path().join("backups"));

    // Seed application state and take an encrypted backup
    h.store.set(keys::APP_STATE, &pos_state("downtown")).unwrap();
    let options = BackupOptions {
        encryption_enabled: true,
        passphrase: Some("shift-key".into()),
        ..Default::default()
    };
    let outcomes = h
        .backup
        .run_backup(&Destinations::local_only(), &options)
        .unwrap();
    let record = outcomes[0].record().expect("backup stored").clone();
    assert!(record.encrypted);
    assert_eq!(h.history.list(None).unwrap().len(), 1);

    // Materialize the envelope to a downloadable file, then ingest it back
    let exported = tmp.path().join("till-backup.json");
    h.local.export_file(&record.id, &exported).unwrap();
    let envelope = LocalBackend::import_file(&exported).unwrap();

    // Mutate live state, then restore the exported snapshot
    h.store.set(keys::APP_STATE, &pos_state("harbor")).unwrap();
    let result = h
        .restore
        .restore(
            &envelope,
            &RestoreOptions {
                passphrase: Some("shift-key".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(result.reload_required);
    assert!(result.safety_record.is_some());

    // Restored state matches the original snapshot
    assert_eq!(
        h.store.get(keys::APP_STATE).unwrap().unwrap(),
        pos_state("downtown")
    );

    // Two records now: the original backup and the preRestore safety snapshot
    let records = h.history.list(None).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .any(|r| r.metadata.label.as_deref() == Some("preRestore")));
}

#[test]
fn corrupt_restore_leaves_everything_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(&tmp.path().join("data"), &tmp.path().join("backups"));

    h.store.set(keys::APP_STATE, &pos_state("downtown")).unwrap();
    h.backup
        .run_backup(&Destinations::local_only(), &BackupOptions::default())
        .unwrap();
    let before_state = h.store.get(keys::APP_STATE).unwrap().unwrap();
    let before_history = h.history.list(None).unwrap().len();

    // Hand-build a corrupt envelope file and try to ingest + restore it
    let corrupt_path = tmp.path().join("corrupt.json");
    std::fs::write(
        &corrupt_path,
        serde_json::json!({
            "encrypted": true,
            "data": "not-base64-garbage",
            "algorithm": "aes-256-gcm",
            "timestamp": "2026-01-01T00:00:00Z",
        })
        .to_string(),
    )
    .unwrap();
    let envelope = LocalBackend::import_file(&corrupt_path).unwrap();
    let err = h
        .restore
        .restore(
            &envelope,
            &RestoreOptions {
                passphrase: Some("whatever".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Format(_) | VaultError::DecryptionFailed
    ));

    assert_eq!(h.store.get(keys::APP_STATE).unwrap().unwrap(), before_state);
    assert_eq!(h.history.list(None).unwrap().len(), before_history);
}

#[test]
fn wrong_passphrase_restore_fails_without_mutation() {
    let tmp = tempfile::tempdir().unwrap();
    let h = harness(&tmp.path().join("data"), &tmp.path().join("backups"));

    h.store.set(keys::APP_STATE, &pos_state("downtown")).unwrap();
    let outcomes = h
        .backup
        .run_backup(
            &Destinations::local_only(),
            &BackupOptions {
                encryption_enabled: true,
                passphrase: Some("right".into()),
                ..Default::default()
            },
        )
        .unwrap();
    let record = outcomes[0].record().unwrap();
    let envelope = h.local.download(&record.id).unwrap();

    let err = h
        .restore
        .restore(
            &envelope,
            &RestoreOptions {
                passphrase: Some("wrong".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, VaultError::DecryptionFailed));
    assert_eq!(
        h.store.get(keys::APP_STATE).unwrap().unwrap(),
        pos_state("downtown")
    );
}

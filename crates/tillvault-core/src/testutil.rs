use std::collections::HashMap;
use std::sync::{Arc, Barrier, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::backup::BackupOrchestrator;
use crate::clock::Clock;
use crate::codec::Envelope;
use crate::config::SchedulerConfig;
use crate::error::{Result, VaultError};
use crate::history::HistoryLedger;
use crate::notify::Notifier;
use crate::ops::InflightGuard;
use crate::payload::BackupType;
use crate::restore::RestoreOrchestrator;
use crate::scheduler::Scheduler;
use crate::storage::{BackendRegistry, StorageBackend, UploadReceipt};
use crate::store::StateStore;

pub const TEST_APP_VERSION: &str = "9.9.9-test";

/// In-memory keyed document store. Thread-safe via Mutex.
pub struct MemoryStateStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

/// In-memory storage backend, registrable under any id/kind.
pub struct MemoryBackend {
    id: String,
    kind: BackupType,
    pub envelopes: Mutex<HashMap<String, Envelope>>,
}

impl MemoryBackend {
    pub fn new(id: &str, kind: BackupType) -> Self {
        Self {
            id: id.to_string(),
            kind,
            envelopes: Mutex::new(HashMap::new()),
        }
    }

    pub fn stored_count(&self) -> usize {
        self.envelopes.lock().unwrap().len()
    }
}

impl StorageBackend for MemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BackupType {
        self.kind
    }

    fn upload(&self, envelope: &Envelope, name: &str) -> Result<UploadReceipt> {
        self.envelopes
            .lock()
            .unwrap()
            .insert(name.to_string(), envelope.clone());
        Ok(UploadReceipt {
            id: name.to_string(),
            locator: Some(format!("mem://{}/{name}", self.id)),
        })
    }

    fn download(&self, id: &str) -> Result<Envelope> {
        self.envelopes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| VaultError::Provider {
                backend_id: self.id.clone(),
                cause: format!("object '{id}' not found"),
            })
    }
}

/// Backend whose uploads always fail, for partial-success tests.
pub struct FailingBackend {
    id: String,
}

impl FailingBackend {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl StorageBackend for FailingBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BackupType {
        BackupType::Cloud
    }

    fn upload(&self, _envelope: &Envelope, _name: &str) -> Result<UploadReceipt> {
        Err(VaultError::Provider {
            backend_id: self.id.clone(),
            cause: "simulated outage".into(),
        })
    }

    fn download(&self, _id: &str) -> Result<Envelope> {
        Err(VaultError::Provider {
            backend_id: self.id.clone(),
            cause: "simulated outage".into(),
        })
    }
}

/// Backend that parks every upload on a barrier so tests can hold a backup
/// in flight while another operation is attempted.
pub struct BlockingBackend {
    inner: MemoryBackend,
    pub entered: Arc<Barrier>,
    pub release: Arc<Barrier>,
}

impl BlockingBackend {
    pub fn new(id: &str) -> Self {
        Self {
            inner: MemoryBackend::new(id, BackupType::Local),
            entered: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
        }
    }
}

impl StorageBackend for BlockingBackend {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn kind(&self) -> BackupType {
        self.inner.kind()
    }

    fn upload(&self, envelope: &Envelope, name: &str) -> Result<UploadReceipt> {
        self.entered.wait();
        self.release.wait();
        self.inner.upload(envelope, name)
    }

    fn download(&self, id: &str) -> Result<Envelope> {
        self.inner.download(id)
    }
}

/// Settable clock for driving due-checks without real waits.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 2026-03-10 12:00:00 UTC, an arbitrary fixed instant.
    pub fn default_start() -> Self {
        Self::at(Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Notifier that records everything it is told.
#[derive(Default)]
pub struct CollectingNotifier {
    pub successes: Mutex<Vec<(String, String)>>,
    pub failures: Mutex<Vec<(String, String)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl Notifier for CollectingNotifier {
    fn notify_success(&self, operation: &str, message: &str) {
        self.successes
            .lock()
            .unwrap()
            .push((operation.to_string(), message.to_string()));
    }

    fn notify_failure(&self, operation: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((operation.to_string(), message.to_string()));
    }
}

/// Fully wired in-memory environment shared by most orchestration tests.
pub struct TestEnv {
    pub store: Arc<MemoryStateStore>,
    pub local: Arc<MemoryBackend>,
    pub registry: Arc<BackendRegistry>,
    pub history: Arc<HistoryLedger>,
    pub clock: Arc<FakeClock>,
    pub notifier: Arc<CollectingNotifier>,
    pub guard: Arc<InflightGuard>,
    pub backup: Arc<BackupOrchestrator>,
    pub restore: RestoreOrchestrator,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_extra_backends(Vec::new())
    }

    pub fn with_extra_backends(extra: Vec<Arc<dyn StorageBackend>>) -> Self {
        let store = Arc::new(MemoryStateStore::new());
        let local = Arc::new(MemoryBackend::new("local", BackupType::Local));
        let mut registry = BackendRegistry::new();
        registry.register(Arc::clone(&local) as Arc<dyn StorageBackend>);
        for backend in extra {
            registry.register(backend);
        }
        let registry = Arc::new(registry);
        let history = Arc::new(HistoryLedger::new(
            Arc::clone(&store) as Arc<dyn StateStore>
        ));
        let clock = Arc::new(FakeClock::default_start());
        let notifier = Arc::new(CollectingNotifier::new());
        let guard = Arc::new(InflightGuard::new());

        let backup = Arc::new(BackupOrchestrator::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&registry),
            Arc::clone(&history),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&guard),
            TEST_APP_VERSION,
        ));
        let restore = RestoreOrchestrator::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&backup),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&guard),
        );

        Self {
            store,
            local,
            registry,
            history,
            clock,
            notifier,
            guard,
            backup,
            restore,
        }
    }

    /// Seed the application-state document.
    pub fn seed_state(&self, state: Value) {
        self.store
            .set(crate::store::keys::APP_STATE, &state)
            .unwrap();
    }

    pub fn current_state(&self) -> Option<Value> {
        self.store.get(crate::store::keys::APP_STATE).unwrap()
    }

    pub fn scheduler(&self, config: SchedulerConfig) -> Scheduler {
        Scheduler::new(
            config,
            Arc::clone(&self.backup),
            Arc::clone(&self.history),
            Arc::clone(&self.store) as Arc<dyn StateStore>,
            Arc::clone(&self.clock) as Arc<dyn Clock>,
            None,
        )
    }
}

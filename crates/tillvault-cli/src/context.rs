use std::path::Path;
use std::sync::Arc;

use tillvault_core::backup::BackupOrchestrator;
use tillvault_core::clock::{Clock, SystemClock};
use tillvault_core::config::AppConfig;
use tillvault_core::error::Result;
use tillvault_core::history::HistoryLedger;
use tillvault_core::notify::{LogNotifier, Notifier};
use tillvault_core::ops::InflightGuard;
use tillvault_core::restore::RestoreOrchestrator;
use tillvault_core::scheduler::Scheduler;
use tillvault_core::storage::{BackendRegistry, LocalBackend, RestBackend, StorageBackend};
use tillvault_core::store::{FileStateStore, StateStore};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a command needs, wired once from the loaded config.
pub(crate) struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn StateStore>,
    pub local: Arc<LocalBackend>,
    pub history: Arc<HistoryLedger>,
    pub backup: Arc<BackupOrchestrator>,
    pub restore: RestoreOrchestrator,
    clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn StateStore> =
            Arc::new(FileStateStore::new(Path::new(&config.data_dir))?);
        let local = Arc::new(LocalBackend::new(Path::new(&config.backup_dir))?);

        let mut registry = BackendRegistry::new();
        registry.register(Arc::clone(&local) as Arc<dyn StorageBackend>);
        if let Some(ref remote) = config.remote {
            registry.register(Arc::new(RestBackend::new(
                &remote.id,
                &remote.url,
                remote.token.as_deref(),
            )));
        }
        let registry = Arc::new(registry);

        let history = Arc::new(HistoryLedger::new(Arc::clone(&store)));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let guard = Arc::new(InflightGuard::new());

        let backup = Arc::new(BackupOrchestrator::new(
            Arc::clone(&store),
            registry,
            Arc::clone(&history),
            Arc::clone(&clock),
            Arc::clone(&notifier),
            Arc::clone(&guard),
            APP_VERSION,
        ));
        let restore = RestoreOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&backup),
            Arc::clone(&clock),
            notifier,
            guard,
        );

        Ok(Self {
            config,
            store,
            local,
            history,
            backup,
            restore,
            clock,
        })
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.config.scheduler.clone(),
            Arc::clone(&self.backup),
            Arc::clone(&self.history),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.resolve_passphrase(),
        )
    }
}

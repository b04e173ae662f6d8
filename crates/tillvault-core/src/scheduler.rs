use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::backup::{BackupOptions, BackupOrchestrator, DestinationOutcome};
use crate::clock::Clock;
use crate::config::{Frequency, SchedulerConfig};
use crate::error::{Result, VaultError};
use crate::history::{HistoryFilter, HistoryLedger};
use crate::store::{keys, StateStore};

/// Scheduler state as seen by callers. `last_backup_time` is durable;
/// `is_running` exists only in memory.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub last_backup_time: Option<DateTime<Utc>>,
    pub is_running: bool,
}

/// Pure due-check: decides whether a scheduled backup should fire at `now`
/// given the last successful backup time.
pub fn should_backup_now(
    now: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
    config: &SchedulerConfig,
) -> bool {
    let Some(last) = last else {
        // Nothing on record yet: always due.
        return true;
    };
    let elapsed = now - last;
    match config.frequency {
        Frequency::Hourly => elapsed >= chrono::Duration::hours(1),
        // Once per calendar day, at or after the configured time-of-day.
        Frequency::Daily => {
            now.date_naive() != last.date_naive() && now.time() >= config.daily_time()
        }
        Frequency::Weekly => elapsed >= chrono::Duration::days(7),
        Frequency::Monthly => elapsed >= chrono::Duration::days(30),
    }
}

/// Drives periodic backups: a worker thread wakes on the cadence derived
/// from the configured frequency, runs the due-check, invokes the backup
/// orchestrator, and applies retention cleanup. Failures are reported and
/// swallowed at this boundary; they never stop future ticks and never
/// advance `last_backup_time`.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct SchedulerInner {
    config: RwLock<SchedulerConfig>,
    backup: Arc<BackupOrchestrator>,
    history: Arc<HistoryLedger>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    passphrase: Option<String>,
    shutdown: AtomicBool,
    running: AtomicBool,
    /// Bumped by `update_config` so the worker rearms its wake cadence.
    generation: AtomicU64,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        backup: Arc<BackupOrchestrator>,
        history: Arc<HistoryLedger>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config: RwLock::new(config),
                backup,
                history,
                store,
                clock,
                passphrase,
                shutdown: AtomicBool::new(false),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Stopped → Running. Performs an immediate due-check, then arms the
    /// periodic wake-up. Idempotent while running.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return;
        }
        self.inner.shutdown.store(false, Ordering::SeqCst);
        self.inner.running.store(true, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        tracing::info!("scheduler starting");
        *worker = Some(std::thread::spawn(move || inner.worker_loop()));
    }

    /// Running → Stopped. Cancels future ticks only; an in-flight backup
    /// finishes on its own. Idempotent.
    pub fn stop(&self) {
        let handle = self.worker.lock().unwrap().take();
        let Some(handle) = handle else { return };
        self.inner.shutdown.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            tracing::error!("scheduler worker panicked");
        }
        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!("scheduler stopped");
    }

    /// Hot-apply new settings. The worker rearms its wake cadence without
    /// touching `last_backup_time`.
    pub fn update_config(&self, config: SchedulerConfig) -> Result<()> {
        config.validate()?;
        *self.inner.config.write().unwrap() = config;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        tracing::info!("scheduler configuration updated");
        Ok(())
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config.read().unwrap().clone()
    }

    pub fn state(&self) -> Result<SchedulerState> {
        Ok(SchedulerState {
            last_backup_time: self.inner.last_backup_time()?,
            is_running: self.inner.running.load(Ordering::SeqCst),
        })
    }

    /// Run a backup now, bypassing the due-check but following the same
    /// success path: advance `last_backup_time`, then retention cleanup.
    /// Rejected with `Busy` if a backup or restore is already in flight.
    pub fn force_backup(&self) -> Result<Vec<DestinationOutcome>> {
        let config = self.config();
        self.inner.run_cycle(&config)
    }

    /// Run one due-check tick synchronously. Exposed for the worker and
    /// for tests driving a fake clock.
    pub fn tick(&self) {
        self.inner.tick();
    }
}

impl SchedulerInner {
    fn worker_loop(self: Arc<Self>) {
        // Immediate due-check on start.
        self.tick();

        let mut generation = self.generation.load(Ordering::SeqCst);
        let mut next_wake = self.clock.now() + self.wake_interval();
        self.log_next_wake(next_wake);

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("scheduler shutdown requested, exiting worker");
                return;
            }

            let current = self.generation.load(Ordering::SeqCst);
            if current != generation {
                generation = current;
                self.tick();
                next_wake = self.clock.now() + self.wake_interval();
                self.log_next_wake(next_wake);
            } else if self.clock.now() >= next_wake {
                self.tick();
                next_wake = self.clock.now() + self.wake_interval();
                self.log_next_wake(next_wake);
            }

            // 1s granularity keeps shutdown and config changes responsive.
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    fn wake_interval(&self) -> chrono::Duration {
        let interval = self.config.read().unwrap().wake_interval();
        chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    fn log_next_wake(&self, next_wake: DateTime<Utc>) {
        tracing::info!(next_wake = %next_wake.format("%Y-%m-%d %H:%M:%S UTC"), "next due-check scheduled");
    }

    fn tick(&self) {
        let config = self.config.read().unwrap().clone();
        if !config.enabled {
            return;
        }
        let now = self.clock.now();
        let last = match self.last_backup_time() {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(error = %e, "could not read last backup time; treating as unset");
                None
            }
        };
        if !should_backup_now(now, last, &config) {
            tracing::trace!("scheduled backup not due");
            return;
        }

        tracing::info!(frequency = %config.frequency, "scheduled backup due");
        match self.run_cycle(&config) {
            Ok(_) => {}
            Err(VaultError::Busy(kind)) => {
                tracing::info!(in_flight = %kind, "skipping scheduled backup: operation in flight");
            }
            Err(e) => {
                // Reported by the orchestrator's notifier; the next tick
                // retries because last_backup_time was not advanced.
                tracing::error!(error = %e, "scheduled backup failed");
            }
        }
    }

    /// One backup cycle: orchestrate, and on success persist
    /// `last_backup_time` and apply retention cleanup (best effort).
    fn run_cycle(&self, config: &SchedulerConfig) -> Result<Vec<DestinationOutcome>> {
        let options = BackupOptions {
            encryption_enabled: config.encryption_enabled,
            passphrase: self.passphrase.clone(),
            auto_backup: true,
            frequency: Some(config.frequency),
            label: None,
        };
        let now = self.clock.now();
        let outcomes = self.backup.run_backup(&config.destinations, &options)?;

        let stored = outcomes.iter().filter(|o| o.record().is_some()).count();
        if stored > 0 {
            if let Err(e) = self.persist_last_backup_time(now) {
                tracing::warn!(error = %e, "failed to persist last backup time");
            }
            if let Err(e) = self.cleanup_old_backups(config) {
                // Non-fatal: cleanup failure never fails the backup run.
                tracing::warn!(error = %e, "retention cleanup failed");
            }
        }
        Ok(outcomes)
    }

    fn last_backup_time(&self) -> Result<Option<DateTime<Utc>>> {
        match self.store.get(keys::LAST_BACKUP_TIME)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn persist_last_backup_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.store
            .set(keys::LAST_BACKUP_TIME, &serde_json::to_value(at)?)
    }

    /// Keep the `max_backups` most recent auto-backup records and delete
    /// the rest. Manually created records are never touched, regardless of
    /// how many there are.
    fn cleanup_old_backups(&self, config: &SchedulerConfig) -> Result<usize> {
        let auto = self
            .history
            .list(Some(&HistoryFilter {
                auto_only: true,
                ..Default::default()
            }))
            .map_err(|e| VaultError::Retention(e.to_string()))?;

        let mut deleted = 0;
        // list() returns newest-first; everything past the cap goes.
        for record in auto.iter().skip(config.max_backups) {
            self.history
                .delete(&record.id)
                .map_err(|e| VaultError::Retention(e.to_string()))?;
            deleted += 1;
        }
        if deleted > 0 {
            tracing::info!(deleted, cap = config.max_backups, "retention cleanup removed old auto-backups");
        }
        Ok(deleted)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

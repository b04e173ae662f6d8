use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::context::AppContext;
use crate::signal::SHUTDOWN;

pub(crate) fn run_daemon(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = &ctx.config.scheduler;
    if !schedule.enabled {
        return Err(
            "scheduler.enabled is false; set it to true in your config to use daemon mode".into(),
        );
    }

    // Pre-validate the passphrase so an unattended daemon never discovers
    // it is missing at 2am.
    if schedule.encryption_enabled && ctx.config.resolve_passphrase().is_none() {
        return Err(format!(
            "scheduler.encryption_enabled is true but no passphrase is available; \
             set {} or the `passphrase` config field",
            tillvault_core::config::PASSPHRASE_ENV
        )
        .into());
    }

    crate::signal::install_signal_handlers();

    let scheduler = ctx.scheduler();
    tracing::info!(
        frequency = %schedule.frequency,
        destinations = ?schedule.destinations.backend_ids(),
        max_backups = schedule.max_backups,
        "daemon starting"
    );
    scheduler.start();

    loop {
        if SHUTDOWN.load(Ordering::SeqCst) {
            tracing::info!("shutdown signal received, exiting");
            break;
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    scheduler.stop();
    Ok(())
}

use tillvault_core::backup::{BackupOptions, DestinationOutcome};
use tillvault_core::config::Destinations;

use crate::context::AppContext;
use crate::format::format_bytes;

pub(crate) fn run_backup(
    ctx: &AppContext,
    remote: bool,
    no_local: bool,
    encrypt: bool,
    label: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let remote_id = if remote {
        match ctx.config.remote {
            Some(ref r) => Some(r.id.clone()),
            None => {
                return Err(
                    "no remote backend configured; add a `remote:` section to the config".into(),
                )
            }
        }
    } else {
        None
    };
    let destinations = Destinations {
        local: !no_local,
        remote: remote_id,
    };

    let passphrase = ctx.config.resolve_passphrase();
    if encrypt && passphrase.is_none() {
        return Err(format!(
            "encryption requested but no passphrase is configured; \
             set {} or the `passphrase` config field",
            tillvault_core::config::PASSPHRASE_ENV
        )
        .into());
    }

    let options = BackupOptions {
        encryption_enabled: encrypt,
        passphrase,
        label,
        ..Default::default()
    };
    let outcomes = ctx.backup.run_backup(&destinations, &options)?;

    let mut stored = 0;
    for outcome in &outcomes {
        match outcome {
            DestinationOutcome::Stored(record) => {
                stored += 1;
                println!(
                    "Stored {} to {} ({}{})",
                    record.id,
                    record.provider.as_deref().unwrap_or("local"),
                    format_bytes(record.size_bytes),
                    if record.encrypted { ", encrypted" } else { "" },
                );
            }
            DestinationOutcome::Failed { backend_id, error } => {
                eprintln!("Destination '{backend_id}' failed: {error}");
            }
        }
    }

    if stored == 0 {
        return Err("backup failed for every destination".into());
    }
    Ok(())
}

use std::path::Path;

use tillvault_core::codec::Envelope;
use tillvault_core::restore::RestoreOptions;
use tillvault_core::storage::{LocalBackend, StorageBackend};

use crate::context::AppContext;

pub(crate) fn run_restore(
    ctx: &AppContext,
    backup: &str,
    skip_safety_backup: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let envelope = resolve_envelope(ctx, backup)?;

    let options = RestoreOptions {
        skip_safety_backup,
        passphrase: ctx.config.resolve_passphrase(),
    };
    let result = ctx.restore.restore(&envelope, &options)?;

    println!(
        "Restored snapshot from {} (payload version {}).",
        result.restored_timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        result.restored_version,
    );
    if let Some(safety) = result.safety_record {
        println!("Previous state saved as backup {}.", safety.id);
    }
    println!("Restart the application to load the restored state.");
    Ok(())
}

/// A restore source is either a history record id (fetched from the local
/// backend) or a path to an exported backup file.
fn resolve_envelope(
    ctx: &AppContext,
    backup: &str,
) -> Result<Envelope, Box<dyn std::error::Error>> {
    let path = Path::new(backup);
    if path.exists() {
        return Ok(LocalBackend::import_file(path)?);
    }
    match ctx.history.find(backup)? {
        Some(record) => Ok(ctx.local.download(&record.id)?),
        None => Err(format!("no backup record or file named '{backup}'").into()),
    }
}

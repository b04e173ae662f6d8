use std::path::Path;

use crate::context::AppContext;

pub(crate) fn run_export(
    ctx: &AppContext,
    id: &str,
    dest: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = ctx
        .history
        .find(id)?
        .ok_or_else(|| format!("no backup record with id '{id}'"))?;

    ctx.local.export_file(&record.id, Path::new(dest))?;
    println!("Exported backup {} to {dest}.", record.id);
    Ok(())
}

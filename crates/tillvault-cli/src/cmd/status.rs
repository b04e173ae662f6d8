use crate::context::AppContext;
use crate::table::{add_kv_row, CliTableTheme};

pub(crate) fn run_status(ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = ctx.scheduler();
    let state = scheduler.state()?;
    let config = &ctx.config.scheduler;

    let theme = CliTableTheme::detect();
    let mut table = theme.new_kv_table();
    add_kv_row(
        &mut table,
        theme,
        "Scheduled backups",
        if config.enabled { "enabled" } else { "disabled" },
    );
    add_kv_row(&mut table, theme, "Frequency", config.frequency);
    add_kv_row(&mut table, theme, "Daily time", &config.time);
    add_kv_row(
        &mut table,
        theme,
        "Destinations",
        config.destinations.backend_ids().join(", "),
    );
    add_kv_row(
        &mut table,
        theme,
        "Encryption",
        if config.encryption_enabled { "on" } else { "off" },
    );
    add_kv_row(&mut table, theme, "Retention cap", config.max_backups);
    add_kv_row(
        &mut table,
        theme,
        "Last backup",
        match state.last_backup_time {
            Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => "never".to_string(),
        },
    );
    add_kv_row(&mut table, theme, "History records", ctx.history.len()?);
    println!("{table}");

    Ok(())
}

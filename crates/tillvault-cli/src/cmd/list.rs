use comfy_table::Cell;

use tillvault_core::history::HistoryFilter;

use crate::context::AppContext;
use crate::format::format_bytes;
use crate::table::CliTableTheme;

pub(crate) fn run_list(
    ctx: &AppContext,
    last: Option<usize>,
    auto: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = HistoryFilter {
        auto_only: auto,
        ..Default::default()
    };
    let mut records = ctx.history.list(Some(&filter))?;

    if let Some(n) = last {
        records.truncate(n);
    }
    if records.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    let theme = CliTableTheme::detect();
    let mut table = theme.new_data_table(&["ID", "Type", "Date", "Size", "Encrypted", "Label"]);

    for record in &records {
        let type_col = match record.provider {
            Some(ref provider) => provider.clone(),
            None => "local".to_string(),
        };
        let mut label_col = record.metadata.label.clone().unwrap_or_default();
        if record.metadata.is_auto() {
            if !label_col.is_empty() {
                label_col.push_str(", ");
            }
            label_col.push_str("auto");
        }
        if label_col.is_empty() {
            label_col.push('-');
        }
        table.add_row(vec![
            Cell::new(record.id.clone()),
            Cell::new(type_col),
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(format_bytes(record.size_bytes)),
            Cell::new(if record.encrypted { "yes" } else { "no" }),
            Cell::new(label_col),
        ]);
    }
    println!("{table}");

    Ok(())
}

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, ContentArrangement, Table};

use crate::types::ProcessSnapshot;

/// Listing shown when a query matched several processes. Nothing is picked
/// automatically; the user re-runs with `--pid`.
pub fn render_candidates(candidates: &[ProcessSnapshot]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("PID").add_attribute(Attribute::Bold),
            Cell::new("PPID").add_attribute(Attribute::Bold),
            Cell::new("COMMAND").add_attribute(Attribute::Bold),
        ]);

    for (i, process) in candidates.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(process.pid).fg(Color::Yellow),
            Cell::new(process.ppid),
            Cell::new(process.display_cmdline()),
        ]);
    }

    format!(
        "Multiple matching processes found:\n\n{table}\n\nRe-run with:\n  witr --pid <pid>"
    )
}

use colored::Colorize;

use crate::ancestry::Ancestry;

/// Indented tree from the root down to the explained process.
///
/// A chain that stopped early gets a placeholder root naming the parent
/// that could not be read.
pub fn render_tree(ancestry: &Ancestry) -> String {
    let mut lines = Vec::new();
    let mut depth = 0;

    if let Some(truncation) = ancestry.truncated() {
        lines.push(format!(
            "{}",
            format!("? (pid {}: {})", truncation.pid, truncation.reason).dimmed()
        ));
        depth = 1;
    }

    let target = ancestry.process().pid;
    for process in ancestry.chain().iter().rev() {
        let label = format!("{} (pid {})", process.command, process.pid);
        let label = if process.pid == target {
            label.green().bold().to_string()
        } else {
            label
        };

        if depth == 0 {
            lines.push(label);
        } else {
            lines.push(format!("{}└─ {}", "   ".repeat(depth - 1), label));
        }
        depth += 1;
    }

    lines.join("\n")
}

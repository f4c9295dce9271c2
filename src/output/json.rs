use anyhow::{Context, Result};

use crate::types::Report;

pub fn render_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")
}

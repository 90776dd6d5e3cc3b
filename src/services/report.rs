//! Plain-text report of cumulative CPU time

use comfy_table::presets::ASCII_FULL;
use comfy_table::{CellAlignment, Table};

use crate::types::CumulativeUsage;

/// Whole hours and whole remaining minutes; leftover seconds are dropped.
/// Example: 5400.0 → "1 hours 30 minutes"
pub fn human_readable_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u64;
    format!("{} hours {} minutes", hours, minutes)
}

pub struct ReportFormatter;

impl ReportFormatter {
    /// One row per identity, in the usage's iteration order
    pub fn format(usage: &CumulativeUsage) -> String {
        let mut table = Table::new();
        table.load_preset(ASCII_FULL);
        table.set_header(vec!["User", "CPU Time"]);

        for (identity, seconds) in usage.iter() {
            table.add_row(vec![identity.to_string(), human_readable_time(seconds)]);
        }

        if let Some(column) = table.column_mut(0) {
            column.set_cell_alignment(CellAlignment::Left);
        }
        if let Some(column) = table.column_mut(1) {
            column.set_cell_alignment(CellAlignment::Right);
        }

        table.to_string()
    }
}

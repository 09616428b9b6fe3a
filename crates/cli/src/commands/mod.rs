pub mod collection;
pub mod collections;
pub mod config;
pub mod duplicates;
pub mod group;
pub mod groups;
pub mod import;
pub mod scores;
pub mod similar;

use comfy_table::Table;

/// A table with the shared header style.
pub(crate) fn table<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    table.set_header(header);
    table
}

pub(crate) fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "?".to_string())
}

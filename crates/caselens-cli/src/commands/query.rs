//! Ad-hoc query command

use anyhow::{Context, Result};
use caselens_core::RecordStore;

use super::truncate;

/// Widest column shown in table output
const MAX_COLUMN_WIDTH: usize = 32;

pub fn cmd_query(store: &RecordStore, sql: &str, json: bool) -> Result<()> {
    let table = store.query(sql).context("Query failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    if table.columns.is_empty() {
        println!("(statement returned no columns)");
        return Ok(());
    }

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| truncate(&v.to_string(), MAX_COLUMN_WIDTH))
                .collect()
        })
        .collect();
    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(name.chars().count().min(MAX_COLUMN_WIDTH)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(name, w)| format!("{:w$}", truncate(name, MAX_COLUMN_WIDTH), w = *w))
        .collect();
    println!("{}", header.join(" │ "));
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", rule.join("─┼─"));

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:w$}", c, w = *w))
            .collect();
        println!("{}", line.join(" │ "));
    }

    println!();
    println!(
        "({} row{})",
        table.len(),
        if table.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

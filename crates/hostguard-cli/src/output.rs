use hostguard_core::outcome::{Outcome, Severity};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        // Last column is free text; don't pad it.
        let last = row.len().saturating_sub(1);
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == last {
                    return cell.clone();
                }
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  "));
    }
}

/// One outcome in human form: `ok: message` plus an indented hint.
pub fn print_outcome(outcome: &Outcome) {
    let label = match outcome.status {
        Severity::Ok => "ok",
        Severity::RecoverableError => "error (recoverable)",
        Severity::FatalError => "error (fatal)",
    };
    println!("{label}: {}", outcome.message);
    if let Some(hint) = outcome.remediation_hint.as_deref().filter(|h| !h.is_empty()) {
        println!("  hint: {hint}");
    }
}

use colored::Colorize;
use comfy_table::{Cell, Color, Table};

use crate::fmt::truncate;
use crate::models::{Finding, ImportOutcome, ParsedBatch, RowRecord, Severity};

const MAX_PREVIEW_ROWS: usize = 50;
const MAX_CELL: usize = 28;

fn row_status(batch: &ParsedBatch, row_no: usize) -> Cell {
    let mut worst = None;
    for f in batch.findings_for(row_no) {
        if f.severity == Severity::Error {
            worst = Some(Severity::Error);
            break;
        }
        worst = Some(Severity::Warning);
    }
    match worst {
        Some(Severity::Error) => Cell::new("error").fg(Color::Red),
        Some(Severity::Warning) => Cell::new("warning").fg(Color::Yellow),
        None => Cell::new("ok").fg(Color::Green),
    }
}

pub fn print_batch(batch: &ParsedBatch) {
    let mut table = Table::new();
    let mut header = vec!["#".to_string(), "Line".to_string(), "Status".to_string()];
    header.extend(batch.headers.iter().cloned());
    table.set_header(header);

    for (i, row) in batch.rows.iter().take(MAX_PREVIEW_ROWS).enumerate() {
        let mut cells = vec![
            Cell::new(i + 1),
            Cell::new(row.source_line),
            row_status(batch, i + 1),
        ];
        cells.extend(batch.headers.iter().map(|h| Cell::new(truncate(row.get(h), MAX_CELL))));
        table.add_row(cells);
    }

    println!("Parsed {} input\n{table}", batch.format);
    if batch.rows.len() > MAX_PREVIEW_ROWS {
        println!("... and {} more rows", batch.rows.len() - MAX_PREVIEW_ROWS);
    }
}

pub fn print_finding(f: &Finding) {
    let label = match f.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow(),
    };
    println!("  Row {:<4} {label} {}: {}", f.row, f.field, f.message);
}

pub fn print_findings(batch: &ParsedBatch) {
    if batch.findings.is_empty() {
        return;
    }
    println!();
    for f in &batch.findings {
        print_finding(f);
    }
}

pub fn print_summary(batch: &ParsedBatch) {
    let s = &batch.summary;
    let errors = format!("{} error(s)", s.error_count);
    let warnings = format!("{} warning(s)", s.warning_count);
    println!(
        "\n{} rows, {} valid, {}, {}",
        s.total,
        s.valid,
        if s.error_count > 0 { errors.red().to_string() } else { errors },
        if s.warning_count > 0 { warnings.yellow().to_string() } else { warnings },
    );
}

/// Every field of one row with its findings alongside.
pub fn print_row(batch: &ParsedBatch, row: &RowRecord, row_no: usize) {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value", "Finding"]);
    let mut fields: Vec<&String> = batch.headers.iter().collect();
    for name in row.fields.keys() {
        if !fields.contains(&name) {
            fields.push(name);
        }
    }
    for name in fields {
        let finding = batch
            .findings_for(row_no)
            .find(|f| &f.field == name)
            .map(|f| match f.severity {
                Severity::Error => Cell::new(&f.message).fg(Color::Red),
                Severity::Warning => Cell::new(&f.message).fg(Color::Yellow),
            })
            .unwrap_or_else(|| Cell::new(""));
        table.add_row(vec![Cell::new(name), Cell::new(row.get(name)), finding]);
    }
    println!("Row {row_no} (line {})\n{table}", row.source_line);
}

pub fn print_outcome(outcome: &ImportOutcome) {
    println!(
        "{} imported, {} skipped (duplicates), {} failed",
        outcome.imported.to_string().green(),
        outcome.skipped,
        if outcome.failed > 0 {
            outcome.failed.to_string().red().to_string()
        } else {
            outcome.failed.to_string()
        },
    );
    if outcome.cancelled {
        println!(
            "{}",
            format!(
                "Cancelled after {} row(s); {} not attempted.",
                outcome.processed(),
                outcome.pending
            )
            .yellow()
        );
    }
    for e in &outcome.errors {
        println!("  {}", e.red());
    }
}

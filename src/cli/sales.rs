use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::{amount, truncate};

pub fn list(limit: usize) -> Result<()> {
    let conn = open_db()?;
    let mut stmt = conn.prepare(
        "SELECT date, category, description, quantity, unit_price, total_amount, \
         payment_method, payment_status, transaction_type \
         FROM sales ORDER BY date DESC, id DESC LIMIT ?1",
    )?;
    let rows: Vec<(String, String, String, f64, f64, f64, String, String, String)> = stmt
        .query_map([limit as i64], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })?
        .filter_map(|r| r.ok())
        .collect();

    if rows.is_empty() {
        println!("No sales recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Date", "Category", "Description", "Qty", "Unit price", "Total", "Method", "Status", "Type",
    ]);
    for (date, category, description, qty, price, total, method, status, ttype) in rows {
        table.add_row(vec![
            Cell::new(date),
            Cell::new(category),
            Cell::new(truncate(&description, 30)),
            Cell::new(amount(qty)).set_alignment(CellAlignment::Right),
            Cell::new(amount(price)).set_alignment(CellAlignment::Right),
            Cell::new(amount(total)).set_alignment(CellAlignment::Right),
            Cell::new(method),
            Cell::new(status),
            Cell::new(ttype),
        ]);
    }
    println!("Sales\n{table}");
    Ok(())
}

use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::amount;

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut stmt = conn.prepare(
        "SELECT name, category, purchase_date, purchase_price, current_value, condition, status, location \
         FROM assets ORDER BY category, name",
    )?;
    let rows: Vec<(String, String, Option<String>, f64, f64, String, String, Option<String>)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?
        .filter_map(|r| r.ok())
        .collect();

    if rows.is_empty() {
        println!("No assets recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Name", "Category", "Purchased", "Price", "Value", "Condition", "Status", "Location",
    ]);
    let mut total_value = 0.0;
    for (name, category, purchased, price, value, condition, status, location) in rows {
        total_value += value;
        table.add_row(vec![
            Cell::new(name),
            Cell::new(category),
            Cell::new(purchased.unwrap_or_default()),
            Cell::new(amount(price)).set_alignment(CellAlignment::Right),
            Cell::new(amount(value)).set_alignment(CellAlignment::Right),
            Cell::new(condition),
            Cell::new(status),
            Cell::new(location.unwrap_or_default()),
        ]);
    }
    println!("Assets\n{table}");
    println!("Total current value: {}", amount(total_value));
    Ok(())
}

use rusqlite::OptionalExtension;

use crate::db::{count, get_connection};
use crate::error::Result;
use crate::fmt::amount;
use crate::settings::{db_path, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = db_path();

    let business = if settings.business_name.is_empty() {
        "(not set)"
    } else {
        &settings.business_name
    };
    println!("Business:   {business}");
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Bulk price: {}", amount(settings.bulk_unit_price));

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `estate init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let sales = count(&conn, "sales")?;
    let assets = count(&conn, "assets")?;
    let imports = count(&conn, "imports")?;
    let sales_total: f64 =
        conn.query_row("SELECT coalesce(sum(total_amount), 0) FROM sales", [], |r| r.get(0))?;

    println!();
    println!("Sales:         {sales} ({})", amount(sales_total));
    println!("Assets:        {assets}");
    println!("Imports:       {imports}");

    let last: Option<(String, String, String, i64, i64, i64, bool)> = conn
        .query_row(
            "SELECT kind, source, import_date, imported, skipped, failed, cancelled \
             FROM imports ORDER BY id DESC LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?)),
        )
        .optional()?;
    if let Some((kind, source, date, imported, skipped, failed, cancelled)) = last {
        let note = if cancelled { " (cancelled)" } else { "" };
        println!(
            "Last import:   {kind} from {source} on {date}: {imported} imported, {skipped} skipped, {failed} failed{note}"
        );
    }

    Ok(())
}

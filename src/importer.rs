use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::categorizer::{canonical_category, Category};
use crate::derivation::{
    auto_description, default_payment_method, default_payment_status, fill_sale_defaults,
    resolve_quantity_pricing, transaction_type, TxTypeRules,
};
use crate::detector::{tokenize, LogShape};
use crate::error::{EstateError, Result};
use crate::freeform::{
    is_asset_entry, is_sales_entry, parse_asset_log, DailyLogParser, ASSET_LOG_HEADERS,
    FREEFORM_HEADERS,
};
use crate::models::{
    AssetRecord, Finding, ImportOutcome, InputFormat, ParsedBatch, RowRecord, SaleRecord,
};
use crate::settings::Settings;
use crate::validator::{parse_any_date, AssetRules, RowRules, SaleRules};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag checked before each row. Rows already committed keep their
/// outcome when the flag is raised.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Where validated rows go. Each feature supplies its own payload builder,
/// duplicate probe and commit.
pub trait ImportTarget {
    type Payload;

    fn build(&self, row: &RowRecord) -> Result<Self::Payload>;
    fn is_duplicate(&self, payload: &Self::Payload) -> Result<bool>;
    fn commit(&self, payload: &Self::Payload) -> Result<()>;
}

fn import_row<T: ImportTarget>(target: &T, row: &RowRecord) -> Result<bool> {
    let payload = target.build(row)?;
    if target.is_duplicate(&payload)? {
        return Ok(false);
    }
    target.commit(&payload)?;
    Ok(true)
}

/// Commit every row of a validated batch, in order, one at a time.
///
/// A failing row is counted and reported but never stops the loop. The batch
/// is refused outright while it still carries error findings.
pub fn run_import<T: ImportTarget>(
    batch: &ParsedBatch,
    target: &T,
    cancel: &CancelToken,
) -> Result<ImportOutcome> {
    if batch.summary.error_count > 0 {
        return Err(EstateError::ImportBlocked(batch.summary.error_count));
    }

    let mut outcome = ImportOutcome::default();
    for (i, row) in batch.rows.iter().enumerate() {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            outcome.pending = batch.rows.len() - i;
            tracing::warn!(pending = outcome.pending, "import cancelled");
            break;
        }
        match import_row(target, row) {
            Ok(true) => outcome.imported += 1,
            Ok(false) => {
                tracing::debug!(line = row.source_line, "skipping duplicate row");
                outcome.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(line = row.source_line, error = %e, "row import failed");
                outcome.failed += 1;
                outcome.errors.push(format!("Row {}: {e}", row.source_line));
            }
        }
    }

    tracing::info!(
        imported = outcome.imported,
        skipped = outcome.skipped,
        failed = outcome.failed,
        "import finished"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Import kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Sales,
    Assets,
}

const ALL_KINDS: &[ImportKind] = &[ImportKind::Sales, ImportKind::Assets];

impl ImportKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Assets => "assets",
        }
    }

    pub fn from_key(key: &str) -> Result<Self> {
        ALL_KINDS
            .iter()
            .find(|k| k.key().eq_ignore_ascii_case(key.trim()))
            .copied()
            .ok_or_else(|| EstateError::UnknownKind(key.to_string()))
    }

    /// Downloadable CSV showing the expected column layout.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Sales => include_str!("../templates/sales_template.csv"),
            Self::Assets => include_str!("../templates/assets_template.csv"),
        }
    }

    /// How this kind's free-form logs look.
    pub fn log_shape(&self) -> LogShape {
        match self {
            Self::Sales => LogShape {
                headers: FREEFORM_HEADERS,
                is_entry: is_sales_entry,
            },
            Self::Assets => LogShape {
                headers: ASSET_LOG_HEADERS,
                is_entry: is_asset_entry,
            },
        }
    }

    /// Row rules for a review session under `settings`.
    pub fn rules(&self, settings: &Settings) -> KindRules {
        KindRules {
            kind: *self,
            bulk_unit_price: settings.bulk_unit_price,
        }
    }

    /// Detect, tokenize and fill derived fields. Validation is left to the
    /// review session.
    pub fn parse(&self, text: &str, settings: &Settings) -> Result<ParsedBatch> {
        match self {
            Self::Sales => {
                let parser = DailyLogParser::new(settings.bulk_unit_price);
                let mut batch = tokenize(text, self.log_shape(), |t| parser.parse(t))?;
                let rules = TxTypeRules::for_format(batch.format);
                for row in &mut batch.rows {
                    fill_sale_defaults(row, rules, settings.bulk_unit_price);
                }
                add_missing_headers(&mut batch, SALE_DERIVED_FIELDS);
                Ok(batch)
            }
            Self::Assets => tokenize(text, self.log_shape(), parse_asset_log),
        }
    }
}

/// Validation and re-derivation for one import kind.
#[derive(Debug, Clone, Copy)]
pub struct KindRules {
    pub kind: ImportKind,
    pub bulk_unit_price: f64,
}

impl RowRules for KindRules {
    fn check(&self, row: &RowRecord, index: usize) -> Vec<Finding> {
        match self.kind {
            ImportKind::Sales => SaleRules.check(row, index),
            ImportKind::Assets => AssetRules.check(row, index),
        }
    }

    fn rederive(&self, row: &mut RowRecord, format: InputFormat) {
        if self.kind == ImportKind::Sales {
            fill_sale_defaults(row, TxTypeRules::for_format(format), self.bulk_unit_price);
        }
    }
}

const SALE_DERIVED_FIELDS: &[&str] = &[
    "description",
    "quantity",
    "unit_price",
    "total_amount",
    "transaction_type",
    "payment_method",
    "payment_status",
];

fn add_missing_headers(batch: &mut ParsedBatch, fields: &[&str]) {
    for field in fields {
        let present = batch.headers.iter().any(|h| h == field);
        let filled = batch.rows.iter().any(|r| !r.is_blank(field));
        if !present && filled {
            batch.headers.push(field.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

fn optional(row: &RowRecord, field: &str) -> Option<String> {
    let v = row.get(field);
    (!v.is_empty()).then(|| v.to_string())
}

fn iso_date(raw: &str) -> Result<String> {
    parse_any_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| EstateError::Other(format!("Invalid date '{raw}'")))
}

fn upper_or(row: &RowRecord, field: &str, default: &str) -> String {
    let v = row.get(field);
    if v.is_empty() {
        default.to_string()
    } else {
        v.to_uppercase()
    }
}

/// Sale payload for `row`. Derived fields are computed afresh, so a value
/// left over from before an edit never reaches the store.
pub fn build_sale(row: &RowRecord, rules: TxTypeRules, bulk_unit_price: f64) -> Result<SaleRecord> {
    let mut row = row.clone();
    fill_sale_defaults(&mut row, rules, bulk_unit_price);
    let row = &row;
    let category = Category::from_key(row.get("category"))
        .unwrap_or_else(|| canonical_category(row.get("category")));
    let date = iso_date(row.get("date"))?;
    let total = row.number("total_amount").unwrap_or_else(|| {
        match (row.number("quantity"), row.number("unit_price")) {
            (Some(q), Some(p)) => q * p,
            (None, Some(p)) => p,
            _ => 0.0,
        }
    });
    let (quantity, unit_price) = resolve_quantity_pricing(
        category,
        row.number("quantity"),
        row.number("unit_price"),
        total,
        bulk_unit_price,
    );

    Ok(SaleRecord {
        date,
        category: category.key().to_string(),
        description: optional(row, "description").unwrap_or_else(|| auto_description(category)),
        quantity,
        unit_price,
        total_amount: total,
        payment_method: upper_or(row, "payment_method", default_payment_method(category).key()),
        payment_status: upper_or(row, "payment_status", default_payment_status(total).key()),
        transaction_type: upper_or(row, "transaction_type", transaction_type(rules, category).key()),
        customer_name: optional(row, "customer_name"),
        notes: optional(row, "notes"),
    })
}

pub fn build_asset(row: &RowRecord) -> Result<AssetRecord> {
    let name = optional(row, "name").ok_or_else(|| EstateError::Other("Name is required".into()))?;
    let purchase_date = match optional(row, "purchase_date") {
        Some(raw) => Some(iso_date(&raw)?),
        None => None,
    };
    let purchase_price = row.number("purchase_price").unwrap_or(0.0);
    Ok(AssetRecord {
        name,
        category: upper_or(row, "category", "OTHER"),
        purchase_date,
        purchase_price,
        current_value: row.number("current_value").unwrap_or(purchase_price),
        condition: upper_or(row, "condition", "GOOD"),
        status: upper_or(row, "status", "ACTIVE"),
        location: optional(row, "location"),
        notes: optional(row, "notes"),
    })
}

// ---------------------------------------------------------------------------
// SQLite targets
// ---------------------------------------------------------------------------

pub struct SaleStore<'a> {
    pub conn: &'a Connection,
    pub rules: TxTypeRules,
    pub bulk_unit_price: f64,
    pub import_id: Option<i64>,
}

impl ImportTarget for SaleStore<'_> {
    type Payload = SaleRecord;

    fn build(&self, row: &RowRecord) -> Result<SaleRecord> {
        build_sale(row, self.rules, self.bulk_unit_price)
    }

    fn is_duplicate(&self, sale: &SaleRecord) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT 1 FROM sales WHERE date = ?1 AND category = ?2 AND abs(total_amount - ?3) < 0.005",
        )?;
        Ok(stmt.exists(rusqlite::params![sale.date, sale.category, sale.total_amount])?)
    }

    fn commit(&self, sale: &SaleRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sales (date, category, description, quantity, unit_price, total_amount, \
             payment_method, payment_status, transaction_type, customer_name, notes, import_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                sale.date,
                sale.category,
                sale.description,
                sale.quantity,
                sale.unit_price,
                sale.total_amount,
                sale.payment_method,
                sale.payment_status,
                sale.transaction_type,
                sale.customer_name,
                sale.notes,
                self.import_id,
            ],
        )?;
        Ok(())
    }
}

pub struct AssetStore<'a> {
    pub conn: &'a Connection,
    pub import_id: Option<i64>,
}

impl ImportTarget for AssetStore<'_> {
    type Payload = AssetRecord;

    fn build(&self, row: &RowRecord) -> Result<AssetRecord> {
        build_asset(row)
    }

    fn is_duplicate(&self, asset: &AssetRecord) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM assets WHERE lower(name) = lower(?1)")?;
        Ok(stmt.exists([&asset.name])?)
    }

    fn commit(&self, asset: &AssetRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO assets (name, category, purchase_date, purchase_price, current_value, \
             condition, status, location, notes, import_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                asset.name,
                asset.category,
                asset.purchase_date,
                asset.purchase_price,
                asset.current_value,
                asset.condition,
                asset.status,
                asset.location,
                asset.notes,
                self.import_id,
            ],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Import log
// ---------------------------------------------------------------------------

pub fn compute_checksum(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn previously_imported(conn: &Connection, kind: &str, checksum: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE kind = ?1 AND checksum = ?2")?;
    Ok(stmt.exists(rusqlite::params![kind, checksum])?)
}

pub fn start_import_log(
    conn: &Connection,
    kind: &str,
    source: &str,
    batch: &ParsedBatch,
    checksum: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO imports (kind, source, format, record_count, checksum) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            kind,
            source,
            batch.format.to_string(),
            batch.rows.len() as i64,
            checksum
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_import_log(conn: &Connection, import_id: i64, outcome: &ImportOutcome) -> Result<()> {
    conn.execute(
        "UPDATE imports SET imported = ?1, skipped = ?2, failed = ?3, cancelled = ?4 WHERE id = ?5",
        rusqlite::params![
            outcome.imported as i64,
            outcome.skipped as i64,
            outcome.failed as i64,
            outcome.cancelled,
            import_id
        ],
    )?;
    Ok(())
}

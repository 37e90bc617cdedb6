use std::collections::HashSet;

use crate::categorizer::{Category, ALL_CATEGORIES};
use crate::derivation::{ALL_PAYMENT_METHODS, ALL_PAYMENT_STATUSES};
use crate::models::{Finding, InputFormat, RowRecord, Severity, Summary};

/// A domain rule set applied to one row at a time. `index` is the 0-based
/// position in the batch; findings report `index + 1`.
pub trait RowRules {
    fn check(&self, row: &RowRecord, index: usize) -> Vec<Finding>;

    /// Recompute derived fields after an edit. Nothing is derived by default.
    fn rederive(&self, _row: &mut RowRecord, _format: InputFormat) {}
}

impl<F> RowRules for F
where
    F: Fn(&RowRecord, usize) -> Vec<Finding>,
{
    fn check(&self, row: &RowRecord, index: usize) -> Vec<Finding> {
        self(row, index)
    }
}

/// Run `rules` over every row and classify the result.
pub fn validate_rows<R: RowRules + ?Sized>(rows: &[RowRecord], rules: &R) -> (Vec<Finding>, Summary) {
    let findings: Vec<Finding> = rows
        .iter()
        .enumerate()
        .flat_map(|(i, row)| rules.check(row, i))
        .collect();
    let summary = summarize(rows.len(), &findings);
    tracing::debug!(
        rows = rows.len(),
        errors = summary.error_count,
        warnings = summary.warning_count,
        "validated batch"
    );
    (findings, summary)
}

pub fn summarize(total: usize, findings: &[Finding]) -> Summary {
    let error_count = findings.iter().filter(|f| f.severity == Severity::Error).count();
    let warning_count = findings.len() - error_count;
    let rows_with_errors: HashSet<usize> = findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .map(|f| f.row)
        .collect();
    Summary {
        total,
        valid: total.saturating_sub(rows_with_errors.len()),
        error_count,
        warning_count,
    }
}

// ---------------------------------------------------------------------------
// Field checks
// ---------------------------------------------------------------------------

// Two-digit years first: `%Y` would read "24" as year 24.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%y", "%d/%m/%Y"];

pub fn parse_any_date(raw: &str) -> Option<chrono::NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| chrono::NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

fn check_required(out: &mut Vec<Finding>, row: &RowRecord, n: usize, field: &str, label: &str) -> bool {
    if row.is_blank(field) {
        out.push(Finding::error(n, field, format!("{label} is required")));
        return false;
    }
    true
}

fn check_one_of(
    out: &mut Vec<Finding>,
    row: &RowRecord,
    n: usize,
    field: &str,
    allowed: &[&str],
    severity: Severity,
) {
    let value = row.get(field);
    if value.is_empty() || allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        return;
    }
    let message = format!("Invalid {field} '{value}'. Must be one of: {}", allowed.join(", "));
    out.push(match severity {
        Severity::Error => Finding::error(n, field, message),
        Severity::Warning => Finding::warning(n, field, message),
    });
}

fn check_amount(out: &mut Vec<Finding>, row: &RowRecord, n: usize, field: &str) {
    if row.is_blank(field) {
        return;
    }
    match row.number(field) {
        Some(v) if v >= 0.0 => {}
        Some(_) => out.push(Finding::warning(n, field, format!("{field} must not be negative"))),
        None => out.push(Finding::warning(
            n,
            field,
            format!("{field} '{}' is not a number", row.get(field)),
        )),
    }
}

fn check_date(out: &mut Vec<Finding>, row: &RowRecord, n: usize, field: &str) {
    let value = row.get(field);
    if !value.is_empty() && parse_any_date(value).is_none() {
        out.push(Finding::warning(
            n,
            field,
            format!("{field} '{value}' is not a recognised date (use YYYY-MM-DD)"),
        ));
    }
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

pub const TRANSACTION_TYPES: &[&str] = &["SHOP_SALE", "BULK_SALE", "PROPERTY_SALE", "CASH_SALE"];

#[derive(Debug, Clone, Copy, Default)]
pub struct SaleRules;

impl RowRules for SaleRules {
    fn check(&self, row: &RowRecord, index: usize) -> Vec<Finding> {
        let n = index + 1;
        let mut out = Vec::new();

        if check_required(&mut out, row, n, "date", "Date") {
            check_date(&mut out, row, n, "date");
        }
        if check_required(&mut out, row, n, "category", "Category") {
            let keys: Vec<&str> = ALL_CATEGORIES.iter().map(Category::key).collect();
            check_one_of(&mut out, row, n, "category", &keys, Severity::Error);
        }
        for field in ["quantity", "unit_price", "total_amount"] {
            check_amount(&mut out, row, n, field);
        }
        let methods: Vec<&str> = ALL_PAYMENT_METHODS.iter().map(|m| m.key()).collect();
        check_one_of(&mut out, row, n, "payment_method", &methods, Severity::Warning);
        let statuses: Vec<&str> = ALL_PAYMENT_STATUSES.iter().map(|s| s.key()).collect();
        check_one_of(&mut out, row, n, "payment_status", &statuses, Severity::Warning);
        check_one_of(&mut out, row, n, "transaction_type", TRANSACTION_TYPES, Severity::Warning);
        out
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

pub const ASSET_CATEGORIES: &[&str] = &[
    "LAND",
    "BUILDING",
    "VEHICLE",
    "EQUIPMENT",
    "FURNITURE",
    "ELECTRONICS",
    "LIVESTOCK",
    "OTHER",
];
pub const ASSET_CONDITIONS: &[&str] = &["EXCELLENT", "GOOD", "FAIR", "POOR"];
pub const ASSET_STATUSES: &[&str] = &["ACTIVE", "INACTIVE", "UNDER_MAINTENANCE", "DISPOSED"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AssetRules;

impl RowRules for AssetRules {
    fn check(&self, row: &RowRecord, index: usize) -> Vec<Finding> {
        let n = index + 1;
        let mut out = Vec::new();

        check_required(&mut out, row, n, "name", "Name");
        if check_required(&mut out, row, n, "category", "Category") {
            check_one_of(&mut out, row, n, "category", ASSET_CATEGORIES, Severity::Error);
        }
        check_one_of(&mut out, row, n, "condition", ASSET_CONDITIONS, Severity::Warning);
        check_one_of(&mut out, row, n, "status", ASSET_STATUSES, Severity::Warning);
        check_amount(&mut out, row, n, "purchase_price");
        check_amount(&mut out, row, n, "current_value");
        check_date(&mut out, row, n, "purchase_date");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(category: &str, total: &str) -> RowRecord {
        let mut row = RowRecord::new(2);
        row.set("date", "2024-03-12");
        row.set("category", category);
        row.set("total_amount", total);
        row
    }

    #[test]
    fn test_valid_sale_has_no_findings() {
        assert!(SaleRules.check(&sale("SHOP", "5000"), 0).is_empty());
    }

    #[test]
    fn test_bogus_category_is_an_error() {
        let findings = SaleRules.check(&sale("BOGUS", "5000"), 2);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].row, 3);
        assert_eq!(findings[0].field, "category");
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_negative_and_bad_numbers_are_warnings() {
        let findings = SaleRules.check(&sale("SHOP", "-5"), 0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);

        let findings = SaleRules.check(&sale("SHOP", "lots"), 0);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("not a number"));
    }

    #[test]
    fn test_unparsable_date_is_warning_missing_date_is_error() {
        let mut row = sale("SHOP", "1");
        row.set("date", "yesterday");
        let findings = SaleRules.check(&row, 0);
        assert_eq!(findings[0].severity, Severity::Warning);

        row.set("date", "");
        let findings = SaleRules.check(&row, 0);
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_asset_rules() {
        let mut row = RowRecord::new(2);
        row.set("name", "Tractor");
        row.set("category", "vehicle");
        row.set("condition", "SHINY");
        row.set("status", "ACTIVE");
        row.set("purchase_date", "12/03/2021");
        let findings = AssetRules.check(&row, 0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field, "condition");
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_asset_missing_name_is_error() {
        let mut row = RowRecord::new(2);
        row.set("category", "LAND");
        let findings = AssetRules.check(&row, 0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field, "name");
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_summary_counts_rows_with_errors_once() {
        let rows = vec![sale("BOGUS", "-1"), sale("SHOP", "5"), sale("", "x")];
        let (findings, summary) = validate_rows(&rows, &SaleRules);
        assert_eq!(findings.len(), 4);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.error_count, 2);
        assert_eq!(summary.warning_count, 2);
        assert_eq!(summary.valid, 1);
        assert!(summary.error_count + summary.warning_count <= findings.len());
    }

    #[test]
    fn test_closure_rules() {
        let rules = |row: &RowRecord, i: usize| {
            if row.is_blank("name") {
                vec![Finding::warning(i + 1, "name", "no name")]
            } else {
                vec![]
            }
        };
        let rows = vec![RowRecord::new(2), RowRecord::new(3)];
        let (findings, summary) = validate_rows(&rows, &rules);
        assert_eq!(findings.len(), 2);
        assert_eq!(summary.valid, 2);
    }
}

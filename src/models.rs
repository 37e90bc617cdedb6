use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// One parsed input record: field name to raw text, plus where it came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowRecord {
    pub source_line: usize,
    pub fields: BTreeMap<String, String>,
    /// Fields computed from other fields rather than read from the input.
    /// They are recomputed whenever the row is derived again.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub derived: BTreeSet<String>,
}

impl RowRecord {
    pub fn new(source_line: usize) -> Self {
        Self {
            source_line,
            ..Default::default()
        }
    }

    /// Value of `field`, trimmed. Missing fields read as "".
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(|v| v.trim()).unwrap_or("")
    }

    /// Set a value as given. A field set this way is no longer derived.
    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_string(), value.into());
        self.derived.remove(field);
    }

    pub fn set_derived(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_string(), value.into());
        self.derived.insert(field.to_string());
    }

    pub fn is_derived(&self, field: &str) -> bool {
        self.derived.contains(field)
    }

    /// Blank or derived: derivation may (re)write it.
    pub fn is_open(&self, field: &str) -> bool {
        self.is_blank(field) || self.is_derived(field)
    }

    /// Blank out every derived field.
    pub fn clear_derived(&mut self) {
        for field in std::mem::take(&mut self.derived) {
            self.fields.insert(field, String::new());
        }
    }

    pub fn is_blank(&self, field: &str) -> bool {
        self.get(field).is_empty()
    }

    /// Parse `field` as a number. Blank or unparsable values give `None`.
    pub fn number(&self, field: &str) -> Option<f64> {
        let raw = self.get(field).replace(',', "");
        if raw.is_empty() {
            return None;
        }
        raw.parse::<f64>().ok()
    }

    /// Like `number`, but only for values that came from the input.
    pub fn supplied_number(&self, field: &str) -> Option<f64> {
        if self.is_derived(field) {
            None
        } else {
            self.number(field)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputFormat {
    Tabular,
    Freeform,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tabular => write!(f, "tabular"),
            Self::Freeform => write!(f, "freeform"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A validation message tied to a row (1-based batch position) and field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub row: usize,
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl Finding {
    pub fn error(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub valid: usize,
    pub error_count: usize,
    pub warning_count: usize,
}

/// The full parse-and-validation result for one submitted input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedBatch {
    pub format: InputFormat,
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
    pub findings: Vec<Finding>,
    pub summary: Summary,
}

impl ParsedBatch {
    pub fn new(format: InputFormat, headers: Vec<String>, rows: Vec<RowRecord>) -> Self {
        let summary = Summary {
            total: rows.len(),
            valid: rows.len(),
            ..Summary::default()
        };
        Self {
            format,
            headers,
            rows,
            findings: Vec::new(),
            summary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn findings_for(&self, row: usize) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.row == row)
    }
}

/// Per-batch import result. Counts follow input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Rows never attempted because the run was cancelled.
    pub pending: usize,
    pub cancelled: bool,
    pub errors: Vec<String>,
}

impl ImportOutcome {
    pub fn processed(&self) -> usize {
        self.imported + self.skipped + self.failed
    }
}

/// A sale ready to be stored, built from a validated row.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub date: String,
    pub category: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub transaction_type: String,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
}

/// A fixed asset ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub name: String,
    pub category: String,
    pub purchase_date: Option<String>,
    pub purchase_price: f64,
    pub current_value: f64,
    pub condition: String,
    pub status: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}

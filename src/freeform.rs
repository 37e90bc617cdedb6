//! Parser for day-by-day activity reports pasted from a messaging app:
//!
//! ```text
//! 12/3/24
//! Shop sales: 85,000
//! Salon: nil
//! Charcoal(30bags): 600000
//! Shop exp: 12000
//! ```
//!
//! A date line opens a reporting day; every `label: amount` line after it
//! becomes one revenue row for that day. Expense and purchase lines are
//! recognised and left out.

use std::sync::OnceLock;

use regex::Regex;

use crate::categorizer::{classify_label, known_category, Category, LabelKind};
use crate::derivation::{fmt_number, resolve_quantity_pricing, DEFAULT_BULK_UNIT_PRICE};
use crate::error::{EstateError, Result};
use crate::models::RowRecord;

pub const FREEFORM_HEADERS: &[&str] = &[
    "date",
    "label",
    "category",
    "description",
    "quantity",
    "unit_price",
    "total_amount",
];

fn date_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:date\s*[:\-]?\s*)?(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").unwrap()
    })
}

fn date_anywhere() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b").unwrap())
}

/// Recognise a `d/m/y` date line. `Ok(None)` means the line is not a date
/// line at all; an impossible calendar day is an error.
///
/// The date may open the line (`12/3/24`, `Date: 12/3/24`) or follow other
/// words (`Monday 12/3/24`) as long as the line is not a `label: amount`
/// entry.
pub fn parse_date_line(line: &str) -> std::result::Result<Option<String>, String> {
    let line = line.trim();
    let caps = match date_line().captures(line) {
        Some(caps) => caps,
        None if !line.contains(':') => match date_anywhere().captures(line) {
            Some(caps) => caps,
            None => return Ok(None),
        },
        None => return Ok(None),
    };
    let day: u32 = caps[1].parse().map_err(|_| format!("bad day in '{line}'"))?;
    let month: u32 = caps[2].parse().map_err(|_| format!("bad month in '{line}'"))?;
    let year_raw = &caps[3];
    let year: i32 = if year_raw.len() == 2 {
        format!("20{year_raw}").parse()
    } else {
        year_raw.parse()
    }
    .map_err(|_| format!("bad year in '{line}'"))?;
    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| Some(d.format("%Y-%m-%d").to_string()))
        .ok_or_else(|| format!("'{}' is not a valid day/month/year date", line.trim()))
}

/// Amount text to a number: `nil` and empty are zero, every character other
/// than digits and `.` is dropped, anything left unparsable is zero.
pub fn parse_log_amount(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nil") {
        return 0.0;
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Split `label: rest` where the label holds no comma. A comma before the
/// colon means the line is a CSV record, not a log entry.
fn entry_parts(line: &str) -> Option<(&str, &str)> {
    let (label, rest) = line.trim().split_once(':')?;
    let label = label.trim();
    (!label.is_empty() && !label.contains(',')).then_some((label, rest.trim()))
}

fn amount_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(nil|[a-z.]{0,4}\s*\d[\d,.\s]*[a-z/=]*)$").unwrap())
}

/// A daily log entry: `label: amount` where the label names a sale
/// category, a bulk good, an expense, or ends in `sales`.
pub fn is_sales_entry(line: &str) -> bool {
    let Some((label, _)) = entry_parts(line) else {
        return false;
    };
    if label.to_lowercase().ends_with("sales") {
        return true;
    }
    match classify_label(label) {
        LabelKind::NonRevenue => true,
        LabelKind::Bulk { category, .. } => category != Category::Other,
        LabelKind::Revenue(_) => known_category(label).is_some(),
    }
}

/// An asset log entry: any `name: amount` line whose value reads as money.
pub fn is_asset_entry(line: &str) -> bool {
    entry_parts(line).is_some_and(|(_, amount)| amount_text().is_match(amount))
}

enum LogState {
    NoDate,
    HaveDate(String),
}

#[derive(Debug, Clone, Copy)]
pub struct DailyLogParser {
    pub bulk_unit_price: f64,
}

impl Default for DailyLogParser {
    fn default() -> Self {
        Self {
            bulk_unit_price: DEFAULT_BULK_UNIT_PRICE,
        }
    }
}

impl DailyLogParser {
    pub fn new(bulk_unit_price: f64) -> Self {
        Self { bulk_unit_price }
    }

    pub fn parse(&self, text: &str) -> Result<Vec<RowRecord>> {
        let mut state = LogState::NoDate;
        let mut rows = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_date_line(line) {
                Ok(Some(date)) => {
                    tracing::debug!(line = line_no, %date, "daily log date");
                    state = LogState::HaveDate(date);
                    continue;
                }
                Ok(None) => {}
                Err(message) => {
                    return Err(EstateError::Parse {
                        line: line_no,
                        message,
                    })
                }
            }

            let LogState::HaveDate(date) = &state else {
                tracing::debug!(line = line_no, "skipping line before first date");
                continue;
            };
            let Some((label, amount_text)) = line.split_once(':') else {
                continue;
            };
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            let total = parse_log_amount(amount_text);

            let (category, bags) = match classify_label(label) {
                LabelKind::NonRevenue => {
                    tracing::debug!(line = line_no, label, "skipping expense line");
                    continue;
                }
                LabelKind::Bulk { category, quantity } => (category, Some(quantity)),
                LabelKind::Revenue(category) => (category, None),
            };
            let (quantity, unit_price) =
                resolve_quantity_pricing(category, bags, None, total, self.bulk_unit_price);

            let mut row = RowRecord::new(line_no);
            row.set("date", date.as_str());
            row.set("label", label);
            row.set("category", category.key());
            row.set("description", "");
            match bags {
                Some(_) => row.set("quantity", fmt_number(quantity)),
                None => row.set_derived("quantity", fmt_number(quantity)),
            }
            row.set_derived("unit_price", fmt_number(unit_price));
            row.set("total_amount", fmt_number(total));
            rows.push(row);
        }

        tracing::debug!(rows = rows.len(), "parsed daily log");
        Ok(rows)
    }
}

// (asset category, needles) for asset log labels.
const ASSET_KEYWORDS: &[(&str, &[&str])] = &[
    ("LAND", &["land", "plot", "acre"]),
    ("BUILDING", &["house", "building", "shop", "store", "kiosk"]),
    ("VEHICLE", &["car", "truck", "tractor", "motorcycle", "boda", "pickup"]),
    ("LIVESTOCK", &["cow", "cattle", "goat", "pig", "sheep"]),
    ("FURNITURE", &["chair", "table", "bed", "sofa"]),
    ("ELECTRONICS", &["tv", "fridge", "laptop", "phone", "projector"]),
];

fn guess_asset_category(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    ASSET_KEYWORDS
        .iter()
        .find(|(_, needles)| {
            needles
                .iter()
                .any(|n| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w.starts_with(n)))
        })
        .map_or("OTHER", |(cat, _)| *cat)
}

/// Asset inventory notes in the same `label: amount` shape. Each line is one
/// asset bought for that amount; a date line sets the purchase date of the
/// lines after it. Lines before any date get no purchase date.
pub fn parse_asset_log(text: &str) -> Result<Vec<RowRecord>> {
    let mut current_date: Option<String> = None;
    let mut rows = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_date_line(line) {
            Ok(Some(date)) => {
                current_date = Some(date);
                continue;
            }
            Ok(None) => {}
            Err(message) => {
                return Err(EstateError::Parse {
                    line: line_no,
                    message,
                })
            }
        }
        let Some((name, amount_text)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let price = parse_log_amount(amount_text);
        let mut row = RowRecord::new(line_no);
        row.set("name", name);
        row.set("category", guess_asset_category(name));
        row.set("purchase_date", current_date.clone().unwrap_or_default());
        row.set("purchase_price", fmt_number(price));
        row.set("current_value", fmt_number(price));
        rows.push(row);
    }
    Ok(rows)
}

pub const ASSET_LOG_HEADERS: &[&str] = &[
    "name",
    "category",
    "purchase_date",
    "purchase_price",
    "current_value",
];

//! Default and derived sale fields computed from a category.
//!
//! Everything here is a pure lookup: the same category always yields the
//! same transaction type, payment method and description.

use std::fmt;

use crate::categorizer::{known_category, Category};
use crate::models::{InputFormat, RowRecord};

/// Per-bag price used when a bulk sale reports zero bags.
pub const DEFAULT_BULK_UNIT_PRICE: f64 = 20000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
    ShopSale,
    BulkSale,
    PropertySale,
    CashSale,
}

impl TxType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ShopSale => "SHOP_SALE",
            Self::BulkSale => "BULK_SALE",
            Self::PropertySale => "PROPERTY_SALE",
            Self::CashSale => "CASH_SALE",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The two category → transaction type tables in use. They overlap but are
/// kept apart: the daily log folds property and livestock into cash sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxTypeRules {
    /// Sales entered as records (tabular upload).
    Sales,
    /// Entries read from a pasted daily activity log.
    DailyLog,
}

impl TxTypeRules {
    pub fn for_format(format: InputFormat) -> Self {
        match format {
            InputFormat::Tabular => Self::Sales,
            InputFormat::Freeform => Self::DailyLog,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    BankTransfer,
    Cheque,
    Card,
}

pub const ALL_PAYMENT_METHODS: &[PaymentMethod] = &[
    PaymentMethod::Cash,
    PaymentMethod::MobileMoney,
    PaymentMethod::BankTransfer,
    PaymentMethod::Cheque,
    PaymentMethod::Card,
];

impl PaymentMethod {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::MobileMoney => "MOBILE_MONEY",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::Cheque => "CHEQUE",
            Self::Card => "CARD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Partial,
}

pub const ALL_PAYMENT_STATUSES: &[PaymentStatus] = &[
    PaymentStatus::Paid,
    PaymentStatus::Pending,
    PaymentStatus::Partial,
];

impl PaymentStatus {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Paid => "PAID",
            Self::Pending => "PENDING",
            Self::Partial => "PARTIAL",
        }
    }
}

pub fn transaction_type(rules: TxTypeRules, category: Category) -> TxType {
    if category.is_storefront() {
        return TxType::ShopSale;
    }
    if category.is_bulk() {
        return TxType::BulkSale;
    }
    match rules {
        TxTypeRules::Sales if category.is_property() => TxType::PropertySale,
        _ => TxType::CashSale,
    }
}

pub fn default_payment_method(category: Category) -> PaymentMethod {
    match category {
        Category::MobileMoney => PaymentMethod::MobileMoney,
        Category::Property | Category::Livestock => PaymentMethod::BankTransfer,
        Category::Shop | Category::Salon | Category::Cinema | Category::Charcoal => {
            PaymentMethod::Cash
        }
        Category::Other => PaymentMethod::Cash,
    }
}

/// A sale with nothing received yet is pending.
pub fn default_payment_status(total: f64) -> PaymentStatus {
    if total > 0.0 {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Pending
    }
}

pub fn auto_description(category: Category) -> String {
    match category {
        Category::Shop => "Daily Shop Sales".to_string(),
        Category::Salon => "Daily Salon Sales".to_string(),
        Category::Cinema => "Daily Cinema Sales".to_string(),
        Category::MobileMoney => "Mobile Money Commission".to_string(),
        Category::Charcoal => "Charcoal Sales".to_string(),
        other => format!("{other} Sale"),
    }
}

/// Resolve `(quantity, unit_price)` from partial data.
///
/// Bulk goods and explicit multi-unit rows keep what was given, deriving the
/// unit price from the total when it is missing. A bulk row with no units
/// falls back to `bulk_unit_price`. Storefront rows are daily aggregates, so
/// the total is the nominal unit price of a single unit.
pub fn resolve_quantity_pricing(
    category: Category,
    quantity: Option<f64>,
    unit_price: Option<f64>,
    total: f64,
    bulk_unit_price: f64,
) -> (f64, f64) {
    let explicit_multi = quantity.is_some_and(|q| q > 1.0);
    if category.is_bulk() || explicit_multi {
        let qty = quantity.unwrap_or(1.0);
        let price = match unit_price {
            Some(p) => p,
            None if qty > 0.0 => total / qty,
            None => bulk_unit_price,
        };
        return (qty, price);
    }
    if category.is_storefront() {
        return (1.0, total);
    }
    (quantity.unwrap_or(1.0), unit_price.unwrap_or(total))
}

/// Render a number the way an operator would type it: no trailing `.0`.
pub fn fmt_number(val: f64) -> String {
    if val.fract() == 0.0 && val.abs() < 1e15 {
        format!("{}", val as i64)
    } else {
        let s = format!("{val:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Fill the derived fields of a sale row.
///
/// Only blank fields and fields an earlier pass derived are written, so
/// running this again after an edit to the category or amounts refreshes
/// every derived value while anything the operator typed stays. An
/// unrecognised category is left as typed and its derived fields blanked.
pub fn fill_sale_defaults(row: &mut RowRecord, rules: TxTypeRules, bulk_unit_price: f64) {
    let Some(category) = known_category(row.get("category")) else {
        row.clear_derived();
        return;
    };
    if row.get("category") != category.key() {
        row.set("category", category.key());
    }

    let quantity = row.supplied_number("quantity");
    let unit_price = row.supplied_number("unit_price");
    let total = match row.supplied_number("total_amount") {
        Some(t) => t,
        None if quantity.is_some() || unit_price.is_some() => {
            let t = match (quantity, unit_price) {
                (Some(q), Some(p)) => q * p,
                (None, Some(p)) => p,
                _ => 0.0,
            };
            row.set_derived("total_amount", fmt_number(t));
            t
        }
        None => {
            if row.is_derived("total_amount") {
                row.set_derived("total_amount", "");
            }
            0.0
        }
    };

    if row.is_open("quantity") || row.is_open("unit_price") {
        let (qty, price) =
            resolve_quantity_pricing(category, quantity, unit_price, total, bulk_unit_price);
        if row.is_open("quantity") {
            row.set_derived("quantity", fmt_number(qty));
        }
        if row.is_open("unit_price") {
            row.set_derived("unit_price", fmt_number(price));
        }
    }
    if row.is_open("description") {
        row.set_derived("description", auto_description(category));
    }
    if row.is_open("transaction_type") {
        row.set_derived("transaction_type", transaction_type(rules, category).key());
    }
    if row.is_open("payment_method") {
        row.set_derived("payment_method", default_payment_method(category).key());
    }
    if row.is_open("payment_status") {
        row.set_derived("payment_status", default_payment_status(total).key());
    }
}

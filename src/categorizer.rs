use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Canonical sale category. Every raw token maps to exactly one variant;
/// anything unrecognised lands on `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Shop,
    Salon,
    Cinema,
    MobileMoney,
    Charcoal,
    Property,
    Livestock,
    Other,
}

pub const ALL_CATEGORIES: &[Category] = &[
    Category::Shop,
    Category::Salon,
    Category::Cinema,
    Category::MobileMoney,
    Category::Charcoal,
    Category::Property,
    Category::Livestock,
    Category::Other,
];

impl Category {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Shop => "SHOP",
            Self::Salon => "SALON",
            Self::Cinema => "CINEMA",
            Self::MobileMoney => "MOBILE_MONEY",
            Self::Charcoal => "CHARCOAL",
            Self::Property => "PROPERTY",
            Self::Livestock => "LIVESTOCK",
            Self::Other => "OTHER",
        }
    }

    /// Recurring storefront businesses that report one daily total.
    pub fn is_storefront(&self) -> bool {
        matches!(
            self,
            Self::Shop | Self::Salon | Self::Cinema | Self::MobileMoney
        )
    }

    /// Goods counted in bulk units (bags).
    pub fn is_bulk(&self) -> bool {
        matches!(self, Self::Charcoal)
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Self::Property | Self::Livestock)
    }

    /// Exact lookup of a canonical key such as `MOBILE_MONEY`.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        ALL_CATEGORIES
            .iter()
            .find(|c| c.key().eq_ignore_ascii_case(key))
            .copied()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// (category, needles) checked in order against the lower-cased token.
const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (Category::Salon, &["salon"]),
    (Category::Shop, &["shop"]),
    (Category::Cinema, &["cinema"]),
    (Category::MobileMoney, &["mobile money", "mobile_money", "mobilemoney"]),
    (Category::Charcoal, &["charcoal"]),
    (Category::Property, &["property", "land", "plot", "house"]),
    (Category::Livestock, &["livestock", "cattle", "cow", "goat", "pig"]),
];

fn mm_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bmm\b").unwrap())
}

fn lookup(token: &str) -> Option<Category> {
    let lower = token.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    if let Some(cat) = Category::from_key(&lower) {
        return Some(cat);
    }
    if mm_word().is_match(&lower) {
        return Some(Category::MobileMoney);
    }
    CATEGORY_TABLE
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(cat, _)| *cat)
}

/// Case-normalise a raw category token and map it through the fixed table.
pub fn canonical_category(raw: &str) -> Category {
    lookup(raw).unwrap_or(Category::Other)
}

/// Like `canonical_category`, but `None` when the token is not recognised,
/// so callers can keep the operator's text for validation to flag.
pub fn known_category(raw: &str) -> Option<Category> {
    lookup(raw)
}

/// What a free-form log label means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelKind {
    /// A revenue line reported as one daily aggregate.
    Revenue(Category),
    /// Goods sold by count, e.g. `Charcoal(30bags)`.
    Bulk { category: Category, quantity: f64 },
    /// Expenses and purchases: recognised but not emitted.
    NonRevenue,
}

fn non_revenue_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(exps?|expenses?|expenditure|purchases?|bought)\b").unwrap()
    })
}

fn bulk_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)\(\s*(\d+(?:\.\d+)?)\s*[a-z ]*\)").unwrap())
}

pub fn classify_label(label: &str) -> LabelKind {
    let lower = label.trim().to_lowercase();
    if non_revenue_word().is_match(&lower) {
        return LabelKind::NonRevenue;
    }
    if let Some(caps) = bulk_label().captures(&lower) {
        let quantity = caps[2].parse::<f64>().unwrap_or(0.0);
        return LabelKind::Bulk {
            category: canonical_category(&caps[1]),
            quantity,
        };
    }
    LabelKind::Revenue(canonical_category(&lower))
}

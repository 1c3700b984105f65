//! Deal model and its closed enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Region a key or account is valid in.
///
/// `All` is the criteria-side wildcard; `Global` is the catch-all a seller
/// uses when a listing carries no region restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    All,
    Global,
    Uae,
    Us,
    Uk,
    Eu,
    Turkey,
    Brazil,
    Argentina,
    India,
}

impl Region {
    /// Short lowercase code used in URLs and config files.
    pub fn code(&self) -> &'static str {
        match self {
            Region::All => "all",
            Region::Global => "global",
            Region::Uae => "ae",
            Region::Us => "us",
            Region::Uk => "uk",
            Region::Eu => "eu",
            Region::Turkey => "tr",
            Region::Brazil => "br",
            Region::Argentina => "ar",
            Region::India => "in",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Region::All => "All Regions",
            Region::Global => "Global",
            Region::Uae => "UAE",
            Region::Us => "United States",
            Region::Uk => "United Kingdom",
            Region::Eu => "Europe",
            Region::Turkey => "Turkey",
            Region::Brazil => "Brazil",
            Region::Argentina => "Argentina",
            Region::India => "India",
        }
    }

    /// Parse a region out of free-form listing text (titles, table cells).
    pub fn from_listing_text(text: &str) -> Region {
        let lower = text.to_lowercase();
        if lower.contains("global") {
            Region::Global
        } else if lower.contains("uae") || lower.contains("arab") {
            Region::Uae
        } else if lower.contains("united states") || lower.contains(" us") || lower.starts_with("us") {
            Region::Us
        } else if lower.contains("united kingdom") || lower.contains(" uk") || lower.starts_with("uk") {
            Region::Uk
        } else if lower.contains("europe") || lower.contains(" eu") || lower.starts_with("eu") {
            Region::Eu
        } else if lower.contains("turkey") || lower.contains(" tr") {
            Region::Turkey
        } else if lower.contains("brazil") || lower.contains(" br") {
            Region::Brazil
        } else if lower.contains("argentina") {
            Region::Argentina
        } else if lower.contains("india") {
            Region::India
        } else {
            Region::Global
        }
    }
}

/// What the buyer actually receives. Most retail listings sell keys, so
/// that is the default for site configurations that do not say otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    All,
    #[default]
    Key,
    Account,
}

/// Subscription length covered by the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealDuration {
    All,
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl DealDuration {
    pub fn months(&self) -> u32 {
        match self {
            DealDuration::All => 0,
            DealDuration::OneMonth => 1,
            DealDuration::ThreeMonths => 3,
            DealDuration::SixMonths => 6,
            DealDuration::TwelveMonths => 12,
        }
    }

    /// Guess the duration from a listing title. Listings rarely label the
    /// duration in a structured way, so longest-period keywords win.
    pub fn from_listing_text(text: &str) -> DealDuration {
        let lower = text.to_lowercase();
        if lower.contains("12 month") || lower.contains("1 year") || lower.contains("12-month") {
            DealDuration::TwelveMonths
        } else if lower.contains("6 month") || lower.contains("6-month") {
            DealDuration::SixMonths
        } else if lower.contains("3 month") || lower.contains("3-month") {
            DealDuration::ThreeMonths
        } else {
            DealDuration::OneMonth
        }
    }
}

/// How much a seller can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    High,
    Medium,
    Caution,
}

/// Where a deal came from within one search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Plain HTTP fetch.
    Live,
    /// Scripted-browser challenge render.
    Rendered,
    /// Static reference catalog.
    Fallback,
}

/// One offer from one seller. Valid only for the lifetime of a single
/// search session; the engine never persists these itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub seller_name: String,
    /// Always > 0; listings that fail to parse a positive price are dropped
    /// at extraction time.
    pub price: f64,
    pub currency: String,
    pub region: Region,
    pub product_type: ProductType,
    pub duration: DealDuration,
    pub trust_level: TrustLevel,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub url: String,
    pub is_trial: bool,
    pub fetched_at: DateTime<Utc>,
    pub source_kind: SourceKind,
}

impl Deal {
    /// Key identifying a logically unique offer for deduplication.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            seller_name: self.seller_name.clone(),
            region: self.region,
            duration: self.duration,
        }
    }

    /// Price with a currency symbol, for display surfaces.
    pub fn formatted_price(&self) -> String {
        match self.currency.as_str() {
            "USD" => format!("${:.2}", self.price),
            "EUR" => format!("\u{20ac}{:.2}", self.price),
            "GBP" => format!("\u{a3}{:.2}", self.price),
            "AED" => format!("AED {:.2}", self.price),
            "TRY" => format!("\u{20ba}{:.2}", self.price),
            "BRL" => format!("R${:.2}", self.price),
            "INR" => format!("\u{20b9}{:.2}", self.price),
            other => format!("{} {:.2}", other, self.price),
        }
    }
}

/// The (seller, region, duration) tuple identifying a unique offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub seller_name: String,
    pub region: Region,
    pub duration: DealDuration,
}

/// Generate a short unique deal id.
pub fn generate_deal_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

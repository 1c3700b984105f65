//! Search criteria and the filter predicate applied to every deal.

use serde::{Deserialize, Serialize};

use super::deal::{Deal, DealDuration, ProductType, Region, TrustLevel};

/// Seller trust tiers a search is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustFilter {
    All,
    HighOnly,
    HighAndMedium,
    /// Currently admits the same set as `All`. Kept as a distinct tier so
    /// callers can express intent; see DESIGN.md before relying on it.
    CautionInclusive,
}

impl TrustFilter {
    fn admits(&self, level: TrustLevel) -> bool {
        match self {
            TrustFilter::HighOnly => level == TrustLevel::High,
            TrustFilter::HighAndMedium => level != TrustLevel::Caution,
            TrustFilter::All | TrustFilter::CautionInclusive => true,
        }
    }
}

/// Presentation-level sort applied after the aggregator's canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    #[default]
    PriceLow,
    PriceHigh,
    Rating,
    Trust,
}

/// Filter state for one search session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub region: Region,
    pub product_type: ProductType,
    pub duration: DealDuration,
    pub trust_filter: TrustFilter,
    pub exclude_trials: bool,
    pub sort: SortOption,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            region: Region::All,
            product_type: ProductType::All,
            duration: DealDuration::All,
            trust_filter: TrustFilter::All,
            exclude_trials: true,
            sort: SortOption::PriceLow,
        }
    }
}

impl SearchCriteria {
    /// Whether a deal passes this filter.
    ///
    /// A `Global` deal satisfies any specific region request; the `All`
    /// wildcards on region, type and duration admit everything.
    pub fn matches(&self, deal: &Deal) -> bool {
        if self.region != Region::All
            && deal.region != self.region
            && deal.region != Region::Global
        {
            return false;
        }

        if self.product_type != ProductType::All && deal.product_type != self.product_type {
            return false;
        }

        if self.duration != DealDuration::All && deal.duration != self.duration {
            return false;
        }

        if !self.trust_filter.admits(deal.trust_level) {
            return false;
        }

        if self.exclude_trials && deal.is_trial {
            return false;
        }

        true
    }

    /// Human-readable summary of the active filters.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.region != Region::All {
            parts.push(self.region.display_name().to_string());
        }
        if self.product_type != ProductType::All {
            parts.push(format!("{:?}", self.product_type));
        }
        if self.duration != DealDuration::All {
            parts.push(format!("{} months", self.duration.months()));
        }
        if self.trust_filter != TrustFilter::All {
            parts.push(format!("{:?}", self.trust_filter));
        }
        if parts.is_empty() {
            "no filters".to_string()
        } else {
            parts.join(", ")
        }
    }
}

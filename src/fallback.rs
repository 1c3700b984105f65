//! Reference-price fallback cascade.
//!
//! When a source fails or comes back empty, its contribution is replaced by
//! reference records for that seller; when an entire search fails, the caller
//! can ask for reference records matching the criteria instead. Everything
//! returned here is tagged [`SourceKind::Fallback`] so downstream consumers
//! can tell live prices from reference ones.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::models::{
    Deal, DealDuration, ProductType, Region, SearchCriteria, SourceKind, TrustLevel,
};

/// Read side of the reference price catalog.
pub trait ReferenceCatalog: Send + Sync {
    fn find_by_seller(&self, seller_name: &str) -> Vec<Deal>;
    fn find_by_criteria(&self, criteria: &SearchCriteria) -> Vec<Deal>;
}

/// Built-in catalog of typical price points, compiled from observed listings.
/// Doubles as the demo dataset.
pub struct StaticCatalog;

struct CatalogEntry {
    id: &'static str,
    seller: &'static str,
    price: f64,
    currency: &'static str,
    region: Region,
    product_type: ProductType,
    duration: DealDuration,
    trust: TrustLevel,
    rating: f32,
    review_count: u32,
    url: &'static str,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "cdkeys-1m-global",
        seller: "CDKeys",
        price: 12.99,
        currency: "USD",
        region: Region::Global,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::High,
        rating: 4.7,
        review_count: 15420,
        url: "https://www.cdkeys.com/xbox-live/memberships/xbox-game-pass-ultimate-1-month",
    },
    CatalogEntry {
        id: "cdkeys-3m-global",
        seller: "CDKeys",
        price: 32.99,
        currency: "USD",
        region: Region::Global,
        product_type: ProductType::Key,
        duration: DealDuration::ThreeMonths,
        trust: TrustLevel::High,
        rating: 4.7,
        review_count: 8920,
        url: "https://www.cdkeys.com/xbox-live/memberships/xbox-game-pass-ultimate-3-months",
    },
    CatalogEntry {
        id: "eneba-1m-global",
        seller: "Eneba",
        price: 11.49,
        currency: "EUR",
        region: Region::Global,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::High,
        rating: 4.5,
        review_count: 12300,
        url: "https://www.eneba.com/xbox-xbox-game-pass-ultimate-1-month",
    },
    CatalogEntry {
        id: "eneba-1m-turkey",
        seller: "Eneba",
        price: 7.99,
        currency: "EUR",
        region: Region::Turkey,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::High,
        rating: 4.4,
        review_count: 5670,
        url: "https://www.eneba.com/xbox-xbox-game-pass-ultimate-1-month-turkey",
    },
    CatalogEntry {
        id: "ig-1m-eu",
        seller: "Instant Gaming",
        price: 12.29,
        currency: "EUR",
        region: Region::Eu,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::High,
        rating: 4.6,
        review_count: 9800,
        url: "https://www.instant-gaming.com/en/xbox-game-pass-ultimate/",
    },
    CatalogEntry {
        id: "kinguin-1m-global",
        seller: "Kinguin",
        price: 10.99,
        currency: "EUR",
        region: Region::Global,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::Medium,
        rating: 4.2,
        review_count: 7650,
        url: "https://www.kinguin.net/xbox-game-pass-ultimate",
    },
    CatalogEntry {
        id: "kinguin-3m-global",
        seller: "Kinguin",
        price: 28.99,
        currency: "EUR",
        region: Region::Global,
        product_type: ProductType::Key,
        duration: DealDuration::ThreeMonths,
        trust: TrustLevel::Medium,
        rating: 4.1,
        review_count: 3420,
        url: "https://www.kinguin.net/xbox-game-pass-ultimate-3-months",
    },
    CatalogEntry {
        id: "g2a-1m-global",
        seller: "G2A",
        price: 9.89,
        currency: "EUR",
        region: Region::Global,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::Caution,
        rating: 4.0,
        review_count: 25000,
        url: "https://www.g2a.com/xbox-game-pass-ultimate",
    },
    CatalogEntry {
        id: "g2a-1m-brazil",
        seller: "G2A",
        price: 5.99,
        currency: "EUR",
        region: Region::Brazil,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::Caution,
        rating: 3.9,
        review_count: 4200,
        url: "https://www.g2a.com/xbox-game-pass-ultimate-brazil",
    },
    CatalogEntry {
        id: "gamivo-1m-global",
        seller: "Gamivo",
        price: 11.29,
        currency: "EUR",
        region: Region::Global,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::Medium,
        rating: 4.3,
        review_count: 6780,
        url: "https://www.gamivo.com/product/xbox-game-pass-ultimate-1-month",
    },
    CatalogEntry {
        id: "eneba-1m-uae",
        seller: "Eneba",
        price: 45.00,
        currency: "AED",
        region: Region::Uae,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::High,
        rating: 4.5,
        review_count: 890,
        url: "https://www.eneba.com/xbox-xbox-game-pass-ultimate-1-month-uae",
    },
    CatalogEntry {
        id: "cdkeys-3m-uae",
        seller: "CDKeys",
        price: 125.00,
        currency: "AED",
        region: Region::Uae,
        product_type: ProductType::Key,
        duration: DealDuration::ThreeMonths,
        trust: TrustLevel::High,
        rating: 4.6,
        review_count: 450,
        url: "https://www.cdkeys.com/xbox-game-pass-ultimate-3-months-uae",
    },
    CatalogEntry {
        id: "g2a-1m-account",
        seller: "G2A",
        price: 4.99,
        currency: "EUR",
        region: Region::Global,
        product_type: ProductType::Account,
        duration: DealDuration::OneMonth,
        trust: TrustLevel::Caution,
        rating: 3.5,
        review_count: 1200,
        url: "https://www.g2a.com/xbox-game-pass-ultimate-account",
    },
];

impl CatalogEntry {
    fn to_deal(&self) -> Deal {
        Deal {
            id: self.id.to_string(),
            seller_name: self.seller.to_string(),
            price: self.price,
            currency: self.currency.to_string(),
            region: self.region,
            product_type: self.product_type,
            duration: self.duration,
            trust_level: self.trust,
            rating: Some(self.rating),
            review_count: Some(self.review_count),
            url: self.url.to_string(),
            is_trial: false,
            fetched_at: Utc::now(),
            source_kind: SourceKind::Fallback,
        }
    }
}

impl ReferenceCatalog for StaticCatalog {
    fn find_by_seller(&self, seller_name: &str) -> Vec<Deal> {
        let needle = seller_name.to_lowercase();
        CATALOG
            .iter()
            .filter(|e| e.seller.to_lowercase().contains(&needle))
            .map(CatalogEntry::to_deal)
            .collect()
    }

    fn find_by_criteria(&self, criteria: &SearchCriteria) -> Vec<Deal> {
        CATALOG
            .iter()
            .map(CatalogEntry::to_deal)
            .filter(|d| criteria.matches(d))
            .collect()
    }
}

/// The platform's own storefront price for a region, for comparison.
pub fn official_price(region: Region) -> Deal {
    let (price, currency) = match region {
        Region::Us => (17.99, "USD"),
        Region::Uk => (14.99, "GBP"),
        Region::Eu => (14.99, "EUR"),
        Region::Uae => (55.00, "AED"),
        Region::Turkey => (129.00, "TRY"),
        Region::Brazil => (49.99, "BRL"),
        Region::India => (699.00, "INR"),
        Region::Argentina => (2199.00, "ARS"),
        _ => (17.99, "USD"),
    };

    Deal {
        id: format!("official-ms-{}", region.code()),
        seller_name: "Microsoft Store (Official)".to_string(),
        price,
        currency: currency.to_string(),
        region,
        product_type: ProductType::Key,
        duration: DealDuration::OneMonth,
        trust_level: TrustLevel::High,
        rating: Some(5.0),
        review_count: Some(0),
        url: "https://www.xbox.com/en-US/xbox-game-pass".to_string(),
        is_trial: false,
        fetched_at: Utc::now(),
        source_kind: SourceKind::Fallback,
    }
}

/// Per-source and whole-search fallback over a reference catalog.
#[derive(Clone)]
pub struct FallbackCascade {
    catalog: Arc<dyn ReferenceCatalog>,
}

impl FallbackCascade {
    pub fn new(catalog: Arc<dyn ReferenceCatalog>) -> Self {
        Self { catalog }
    }

    /// Reference deals standing in for one failed or empty source.
    pub fn get_for_source(&self, seller_name: &str) -> Vec<Deal> {
        let deals = self.catalog.find_by_seller(seller_name);
        debug!(seller = seller_name, count = deals.len(), "fallback for source");
        deals
    }

    /// Reference deals for a whole search that produced nothing live.
    pub fn get_for_criteria(&self, criteria: &SearchCriteria) -> Vec<Deal> {
        let deals = self.catalog.find_by_criteria(criteria);
        debug!(count = deals.len(), "fallback for criteria");
        deals
    }
}

impl Default for FallbackCascade {
    fn default() -> Self {
        Self::new(Arc::new(StaticCatalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrustFilter;

    #[test]
    fn seller_lookup_is_case_insensitive_and_tagged() {
        let cascade = FallbackCascade::default();
        let deals = cascade.get_for_source("cdkeys");
        assert!(!deals.is_empty());
        assert!(deals.iter().all(|d| d.seller_name == "CDKeys"));
        assert!(deals.iter().all(|d| d.source_kind == SourceKind::Fallback));
    }

    #[test]
    fn unknown_seller_yields_empty() {
        let cascade = FallbackCascade::default();
        assert!(cascade.get_for_source("NoSuchShop").is_empty());
    }

    #[test]
    fn criteria_lookup_applies_the_filter_predicate() {
        let cascade = FallbackCascade::default();
        let criteria = SearchCriteria {
            region: Region::Turkey,
            trust_filter: TrustFilter::HighOnly,
            ..SearchCriteria::default()
        };
        let deals = cascade.get_for_criteria(&criteria);
        // Global satisfies any region request, so high-trust global deals
        // appear alongside the Turkey-specific one.
        assert!(deals.iter().any(|d| d.region == Region::Turkey));
        assert!(deals
            .iter()
            .all(|d| d.region == Region::Turkey || d.region == Region::Global));
        assert!(deals.iter().all(|d| d.trust_level == TrustLevel::High));
    }

    #[test]
    fn official_price_tracks_region() {
        let us = official_price(Region::Us);
        assert_eq!(us.price, 17.99);
        assert_eq!(us.currency, "USD");
        let tr = official_price(Region::Turkey);
        assert_eq!(tr.currency, "TRY");
        assert_eq!(tr.id, "official-ms-tr");
        assert_eq!(tr.source_kind, SourceKind::Fallback);
    }
}

//! Known seller descriptors.
//!
//! Aggregator-style sources list offers from many merchants; this table
//! assigns trust levels to the ones we recognize. Unknown merchants default
//! to `Medium`.

use super::deal::TrustLevel;

/// A retailer we know something about.
#[derive(Debug, Clone)]
pub struct Seller {
    pub name: &'static str,
    pub website: &'static str,
    pub trust_level: TrustLevel,
    pub description: &'static str,
}

pub const SELLERS: &[Seller] = &[
    Seller {
        name: "CDKeys",
        website: "https://www.cdkeys.com",
        trust_level: TrustLevel::High,
        description: "Well-established digital key retailer with excellent reputation",
    },
    Seller {
        name: "Eneba",
        website: "https://www.eneba.com",
        trust_level: TrustLevel::High,
        description: "Large marketplace with buyer protection",
    },
    Seller {
        name: "Instant Gaming",
        website: "https://www.instant-gaming.com",
        trust_level: TrustLevel::High,
        description: "European-based trusted retailer",
    },
    Seller {
        name: "Green Man Gaming",
        website: "https://www.greenmangaming.com",
        trust_level: TrustLevel::High,
        description: "Authorized official reseller",
    },
    Seller {
        name: "Humble Bundle",
        website: "https://www.humblebundle.com",
        trust_level: TrustLevel::High,
        description: "Official partner, supports charity",
    },
    Seller {
        name: "Kinguin",
        website: "https://www.kinguin.net",
        trust_level: TrustLevel::Medium,
        description: "Marketplace with buyer protection available",
    },
    Seller {
        name: "Gamivo",
        website: "https://www.gamivo.com",
        trust_level: TrustLevel::Medium,
        description: "Marketplace with Smart subscription benefits",
    },
    Seller {
        name: "G2A",
        website: "https://www.g2a.com",
        trust_level: TrustLevel::Caution,
        description: "Large marketplace - check seller ratings before buying",
    },
];

/// Look up a seller by merchant name as it appears on a listing.
pub fn find_by_name(name: &str) -> Option<&'static Seller> {
    let lower = name.to_lowercase();
    SELLERS
        .iter()
        .find(|s| lower.contains(&s.name.to_lowercase()))
}

/// Trust level for a merchant name, defaulting to `Medium` for unknowns.
pub fn trust_for(name: &str) -> TrustLevel {
    find_by_name(name).map(|s| s.trust_level).unwrap_or(TrustLevel::Medium)
}

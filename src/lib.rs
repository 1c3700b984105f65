//! dealscout - multi-source subscription price search.
//!
//! A library-level search engine that scrapes subscription deal listings
//! from a registry of retail sites, renders challenge-protected sites in a
//! scripted browser, falls back to a reference catalog when live fetches
//! fail, and streams deduplicated, price-sorted results to the caller.

pub mod aggregate;
pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod models;
pub mod registry;
pub mod scrapers;
pub mod sites;
pub mod store;

pub use config::EngineConfig;
pub use engine::SearchEngine;
pub use error::{Result, ScrapeError};
pub use fallback::{FallbackCascade, ReferenceCatalog, StaticCatalog};
pub use models::{
    Deal, DealDuration, ProductType, Region, SearchCriteria, SearchOutcome, SearchProgress,
    SortOption, SourceKind, TrustFilter, TrustLevel,
};
pub use registry::{Source, SourceFetcher, SourceRegistry};
pub use store::{DealStore, MemoryStore};

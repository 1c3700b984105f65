//! Domain model for deals, search criteria, and search lifecycle types.

mod criteria;
mod deal;
mod outcome;
pub mod seller;

pub use criteria::{SearchCriteria, SortOption, TrustFilter};
pub use deal::{
    generate_deal_id, Deal, DealDuration, DedupKey, ProductType, Region, SourceKind, TrustLevel,
};
pub use outcome::{SearchOutcome, SearchProgress, SearchStats};

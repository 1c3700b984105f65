//! Search lifecycle types: progress events, the final outcome, and
//! summary statistics over a finished deal list.

use serde::Serialize;

use super::deal::Deal;

/// Progress snapshot pushed to the caller. Emitted when a source starts
/// and again after its results are folded into the aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct SearchProgress {
    pub current_source_label: String,
    pub sources_completed: usize,
    pub total_sources: usize,
    pub deals_found_so_far: usize,
}

/// Final state of one search session.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// A session that has been created but not yet driven to completion.
    Loading,
    Success {
        deals: Vec<Deal>,
        total_found: usize,
        elapsed_ms: u64,
        sources_searched: usize,
    },
    /// No usable result from any source, live or fallback. Callers typically
    /// respond by asking the fallback cascade for criteria-level reference
    /// data.
    Empty,
    /// Session-level fault not attributable to a single source.
    Error {
        message: String,
        cause: Option<String>,
    },
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchOutcome::Success { .. })
    }
}

/// Summary statistics over a finished deal list.
#[derive(Debug, Clone, Serialize)]
pub struct SearchStats {
    pub total_deals: usize,
    pub lowest_price: f64,
    pub highest_price: f64,
    pub average_price: f64,
    /// Most common currency across the list.
    pub currency: String,
    pub seller_count: usize,
}

impl SearchStats {
    pub fn from_deals(deals: &[Deal]) -> Option<SearchStats> {
        if deals.is_empty() {
            return None;
        }

        let mut lowest = f64::MAX;
        let mut highest = f64::MIN;
        let mut sum = 0.0;
        let mut currencies: std::collections::HashMap<&str, usize> = Default::default();
        let mut sellers: std::collections::HashSet<&str> = Default::default();

        for deal in deals {
            lowest = lowest.min(deal.price);
            highest = highest.max(deal.price);
            sum += deal.price;
            *currencies.entry(deal.currency.as_str()).or_default() += 1;
            sellers.insert(deal.seller_name.as_str());
        }

        let currency = currencies
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(c, _)| c.to_string())
            .unwrap_or_else(|| "USD".to_string());

        Some(SearchStats {
            total_deals: deals.len(),
            lowest_price: lowest,
            highest_price: highest,
            average_price: sum / deals.len() as f64,
            currency,
            seller_count: sellers.len(),
        })
    }
}

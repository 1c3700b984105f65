//! Source registry: the ordered, data-driven table of retail sites.
//!
//! Per-site behavior is configuration, not a type hierarchy: each entry
//! pairs a display name with a fetch capability and a couple of scheduling
//! hints. Slow aggregator-style sites sort last so fast retailers stream
//! results first.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Deal, SearchCriteria};

/// Fetch capability for one source. Implementations live behind this seam
/// so the orchestrator never knows whether deals came from plain HTTP, a
/// rendered page, or a test double.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, criteria: &SearchCriteria) -> Result<Vec<Deal>>;
}

/// One registered retail site.
#[derive(Clone)]
pub struct Source {
    pub name: String,
    /// Relative position among sources with the same speed class.
    pub order_hint: u32,
    /// Route through the challenge renderer instead of the plain fetcher.
    pub needs_challenge_render: bool,
    /// Aggregator-style sites are slow; they always sort last.
    pub slow_aggregator: bool,
    pub fetcher: Arc<dyn SourceFetcher>,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("order_hint", &self.order_hint)
            .field("needs_challenge_render", &self.needs_challenge_render)
            .field("slow_aggregator", &self.slow_aggregator)
            .finish()
    }
}

impl Source {
    pub fn new(name: impl Into<String>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            name: name.into(),
            order_hint: 0,
            needs_challenge_render: false,
            slow_aggregator: false,
            fetcher,
        }
    }

    pub fn with_order_hint(mut self, hint: u32) -> Self {
        self.order_hint = hint;
        self
    }

    pub fn challenge_rendered(mut self) -> Self {
        self.needs_challenge_render = true;
        self
    }

    pub fn slow_aggregator(mut self) -> Self {
        self.slow_aggregator = true;
        self
    }
}

/// Immutable ordered table of sources for the process lifetime.
#[derive(Debug)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Build a registry. Sorts by (slow-aggregator, order hint), keeping
    /// registration order for ties.
    pub fn new(mut sources: Vec<Source>) -> Self {
        sources.sort_by_key(|s| (s.slow_aggregator, s.order_hint));
        Self { sources }
    }

    pub fn list(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

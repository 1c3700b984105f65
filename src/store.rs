//! Write-through deal persistence.
//!
//! The engine only needs a sink to push finished aggregates into and a way
//! to read recent ones back; caching policy belongs to the host application.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::models::Deal;

#[async_trait]
pub trait DealStore: Send + Sync {
    async fn put(&self, deals: &[Deal]) -> Result<()>;
    /// Deals fetched at or after `since`, newest first.
    async fn get_recent(&self, since: DateTime<Utc>) -> Result<Vec<Deal>>;
}

/// In-memory store. Replaces any previous record with the same id.
#[derive(Default)]
pub struct MemoryStore {
    deals: RwLock<Vec<Deal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DealStore for MemoryStore {
    async fn put(&self, deals: &[Deal]) -> Result<()> {
        let mut guard = self.deals.write().await;
        guard.retain(|existing| !deals.iter().any(|d| d.id == existing.id));
        guard.extend_from_slice(deals);
        debug!(stored = deals.len(), total = guard.len(), "stored deals");
        Ok(())
    }

    async fn get_recent(&self, since: DateTime<Utc>) -> Result<Vec<Deal>> {
        let guard = self.deals.read().await;
        let mut recent: Vec<Deal> = guard
            .iter()
            .filter(|d| d.fetched_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::deal;
    use crate::models::{DealDuration, Region};
    use chrono::Duration;

    #[tokio::test]
    async fn put_then_get_recent() {
        let store = MemoryStore::new();
        let d = deal("Eneba", 11.49, Region::Global, DealDuration::OneMonth);
        store.put(std::slice::from_ref(&d)).await.unwrap();

        let recent = store
            .get_recent(Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].seller_name, "Eneba");
    }

    #[tokio::test]
    async fn stale_deals_are_not_recent() {
        let store = MemoryStore::new();
        let mut d = deal("CDKeys", 12.99, Region::Global, DealDuration::OneMonth);
        d.fetched_at = Utc::now() - Duration::hours(2);
        store.put(&[d]).await.unwrap();

        let recent = store
            .get_recent(Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert!(recent.is_empty());
    }

    #[tokio::test]
    async fn put_replaces_records_with_same_id() {
        let store = MemoryStore::new();
        let mut d = deal("G2A", 9.89, Region::Global, DealDuration::OneMonth);
        d.id = "fixed".into();
        store.put(std::slice::from_ref(&d)).await.unwrap();

        d.price = 8.99;
        store.put(std::slice::from_ref(&d)).await.unwrap();

        let recent = store
            .get_recent(Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].price, 8.99);
    }
}

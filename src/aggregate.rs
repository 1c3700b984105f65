//! Single-writer result aggregation.
//!
//! The orchestrator folds every source's contribution through [`merge`] on
//! one task, so aggregation stays a pure function over plain `Vec`s with no
//! locking. Output is always deduplicated and fully sorted; callers never
//! re-sort.

use std::collections::HashMap;

use crate::models::{Deal, DedupKey, Region, SourceKind};

/// Merge an incoming batch of deals into the running aggregate.
///
/// Duplicates share a (seller, region, duration) key; the cheapest offer per
/// key wins regardless of arrival order. Sorting puts deals for the selected
/// region (and Global, which satisfies any region) ahead of everything else,
/// then orders by price ascending.
pub fn merge(existing: Vec<Deal>, incoming: Vec<Deal>, selected_region: Region) -> Vec<Deal> {
    let mut by_key: HashMap<DedupKey, Deal> = HashMap::with_capacity(existing.len() + incoming.len());

    for deal in existing.into_iter().chain(incoming) {
        match by_key.entry(deal.dedup_key()) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(deal);
            }
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                if deal.price < slot.get().price {
                    slot.insert(deal);
                }
            }
        }
    }

    let mut deals: Vec<Deal> = by_key.into_values().collect();
    deals.sort_by(|a, b| {
        let bucket_a = region_bucket(a.region, selected_region);
        let bucket_b = region_bucket(b.region, selected_region);
        bucket_a
            .cmp(&bucket_b)
            .then_with(|| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
    });
    deals
}

fn region_bucket(deal_region: Region, selected: Region) -> u8 {
    if deal_region == Region::Global || deal_region == selected {
        0
    } else {
        1
    }
}

/// Whether an aggregate consists entirely of reference data.
pub fn is_all_fallback(deals: &[Deal]) -> bool {
    !deals.is_empty() && deals.iter().all(|d| d.source_kind == SourceKind::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::deal;
    use crate::models::DealDuration;

    #[test]
    fn keeps_cheapest_per_key_across_merges() {
        let existing = vec![deal("Eneba", 12.99, Region::Global, DealDuration::OneMonth)];
        let incoming = vec![
            deal("Eneba", 11.49, Region::Global, DealDuration::OneMonth),
            deal("Eneba", 31.99, Region::Global, DealDuration::ThreeMonths),
        ];

        let merged = merge(existing, incoming, Region::All);
        assert_eq!(merged.len(), 2);
        let one_month = merged
            .iter()
            .find(|d| d.duration == DealDuration::OneMonth)
            .unwrap();
        assert_eq!(one_month.price, 11.49);
    }

    #[test]
    fn cheaper_existing_survives_later_duplicate() {
        let existing = vec![deal("G2A", 9.89, Region::Global, DealDuration::OneMonth)];
        let incoming = vec![deal("G2A", 10.49, Region::Global, DealDuration::OneMonth)];

        let merged = merge(existing, incoming, Region::All);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].price, 9.89);
    }

    #[test]
    fn selected_region_and_global_sort_ahead_of_others() {
        let deals = vec![
            deal("A", 5.99, Region::Brazil, DealDuration::OneMonth),
            deal("B", 12.99, Region::Turkey, DealDuration::OneMonth),
            deal("C", 10.99, Region::Global, DealDuration::OneMonth),
            deal("D", 14.99, Region::Turkey, DealDuration::OneMonth),
        ];

        let merged = merge(Vec::new(), deals, Region::Turkey);
        let order: Vec<(&str, u8)> = merged
            .iter()
            .map(|d| (d.seller_name.as_str(), region_bucket(d.region, Region::Turkey)))
            .collect();
        // Front bucket sorted by price, then the rest by price.
        assert_eq!(order, vec![("C", 0), ("B", 0), ("D", 0), ("A", 1)]);
    }

    #[test]
    fn output_is_sorted_by_price_within_bucket() {
        let deals = vec![
            deal("X", 14.0, Region::Global, DealDuration::OneMonth),
            deal("Y", 9.0, Region::Global, DealDuration::OneMonth),
            deal("Z", 11.0, Region::Global, DealDuration::OneMonth),
        ];
        let merged = merge(Vec::new(), deals, Region::All);
        let prices: Vec<f64> = merged.iter().map(|d| d.price).collect();
        assert_eq!(prices, vec![9.0, 11.0, 14.0]);
    }

    #[test]
    fn all_fallback_detection() {
        let mut a = deal("A", 10.0, Region::Global, DealDuration::OneMonth);
        let mut b = deal("B", 11.0, Region::Global, DealDuration::OneMonth);
        a.source_kind = SourceKind::Fallback;
        b.source_kind = SourceKind::Fallback;
        assert!(is_all_fallback(&[a.clone(), b.clone()]));

        b.source_kind = SourceKind::Live;
        assert!(!is_all_fallback(&[a, b]));
        assert!(!is_all_fallback(&[]));
    }
}

//! Derived views over a snapshot. All functions are pure and keep the
//! relative order of equal elements (stable sort).

use crate::models::MarketRecord;
use std::cmp::Ordering;

/// The `k` records with the highest 24h change, best first.
///
/// Records without a change value never appear in the result.
pub fn top_gainers(snapshot: &[MarketRecord], k: usize) -> Vec<MarketRecord> {
    ranked_by_change(snapshot, k, |a, b| b.total_cmp(&a))
}

/// The `k` records with the lowest 24h change, worst first.
pub fn top_losers(snapshot: &[MarketRecord], k: usize) -> Vec<MarketRecord> {
    ranked_by_change(snapshot, k, |a, b| a.total_cmp(&b))
}

/// Records whose price lies within the inclusive `[min, max]` bounds.
///
/// With no bound set the snapshot is returned as-is. With any bound set, a
/// record without a price is excluded.
pub fn by_price_range(
    snapshot: &[MarketRecord],
    min: Option<f64>,
    max: Option<f64>,
) -> Vec<MarketRecord> {
    if min.is_none() && max.is_none() {
        return snapshot.to_vec();
    }
    snapshot
        .iter()
        .filter(|r| match r.price {
            Some(p) => min.map_or(true, |lo| p >= lo) && max.map_or(true, |hi| p <= hi),
            None => false,
        })
        .cloned()
        .collect()
}

fn ranked_by_change<F>(snapshot: &[MarketRecord], k: usize, cmp: F) -> Vec<MarketRecord>
where
    F: Fn(f64, f64) -> Ordering,
{
    let mut ranked: Vec<(f64, &MarketRecord)> = snapshot
        .iter()
        .filter_map(|r| r.change_24h.map(|c| (c, r)))
        .collect();
    ranked.sort_by(|(a, _), (b, _)| cmp(*a, *b));
    ranked.into_iter().take(k).map(|(_, r)| r.clone()).collect()
}

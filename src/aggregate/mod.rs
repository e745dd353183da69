//! Aggregation primitives: partition row sets into labeled buckets and
//! funnel stages with percentage annotations.
//!
//! Buckets are derived, transient values — recomputed on every pass, never
//! persisted. Rows whose partition key is undefined are excluded from the
//! total and from every bucket; a domain with an explicit "unknown"
//! category surfaces it as a real label through its key function.

pub mod reports;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A labeled count with its share of the partition total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub count: u64,
    /// `round(100 * count / total)`; 0 when the total is 0.
    pub pct: u32,
}

/// An ordered bucket list plus the total it was computed against.
///
/// Invariants: bucket counts sum to `total`; percentages are rounded
/// independently and may miss 100 by up to one per extra bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSet {
    pub buckets: Vec<Bucket>,
    pub total: u64,
}

/// Which count a funnel stage's percentage is relative to. The two modes
/// are not numerically interchangeable, so every stage carries its basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PercentBasis {
    /// Share retained from the immediately preceding stage, rounded.
    PreviousStage,
    /// Share of the first stage, floored so it is never overstated.
    TopOfFunnel,
}

/// One stage of a narrowing process (e.g. eligible → requested → performed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub label: String,
    pub count: u64,
    pub pct: u32,
    pub basis: PercentBasis,
}

/// Integer half-up rounding of `100 * count / total`; 0 for an empty total.
fn pct_round(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((100 * count + total / 2) / total) as u32
}

/// Floored `100 * count / total`; 0 for an empty total.
fn pct_floor(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (100 * count / total) as u32
}

/// Partition `rows` by a key function. Rows mapping to `None` are excluded
/// from the total and from every bucket. Buckets are ordered by count
/// descending, label ascending on ties.
pub fn partition<T, F>(rows: &[T], key: F) -> BucketSet
where
    F: Fn(&T) -> Option<String>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut total = 0u64;
    for row in rows {
        if let Some(label) = key(row) {
            *counts.entry(label).or_default() += 1;
            total += 1;
        }
    }

    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(label, count)| Bucket {
            pct: pct_round(count, total),
            label,
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    BucketSet { buckets, total }
}

/// Partition with a fixed label order. Labels absent from the data keep a
/// zero-count bucket; keys outside `labels` count as undefined.
pub fn partition_ordered<T, F>(rows: &[T], key: F, labels: &[&str]) -> BucketSet
where
    F: Fn(&T) -> Option<String>,
{
    let mut counts: HashMap<&str, u64> = labels.iter().map(|l| (*l, 0)).collect();
    let mut total = 0u64;
    for row in rows {
        if let Some(k) = key(row) {
            if let Some(slot) = counts.get_mut(k.as_str()) {
                *slot += 1;
                total += 1;
            }
        }
    }

    let buckets = labels
        .iter()
        .map(|label| {
            let count = counts[label];
            Bucket {
                label: (*label).to_string(),
                count,
                pct: pct_round(count, total),
            }
        })
        .collect();

    BucketSet { buckets, total }
}

/// Annotate successive-stage counts with percentages under `basis`.
pub fn funnel<S: AsRef<str>>(stages: &[(S, u64)], basis: PercentBasis) -> Vec<FunnelStage> {
    let top = stages.first().map(|(_, c)| *c).unwrap_or(0);
    let mut prev = top;

    stages
        .iter()
        .map(|(label, count)| {
            let pct = match basis {
                PercentBasis::PreviousStage => {
                    let p = pct_round(*count, prev);
                    prev = *count;
                    p
                }
                PercentBasis::TopOfFunnel => pct_floor(*count, top),
            };
            FunnelStage {
                label: label.as_ref().to_string(),
                count: *count,
                pct,
                basis,
            }
        })
        .collect()
}

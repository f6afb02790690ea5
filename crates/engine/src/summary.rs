//! Cumulative per-variant performance summaries with Wilson score intervals.

use bandit_core::{VariantStatistics, VariantSummary};
use std::collections::BTreeMap;

const Z_95: f64 = 1.96;

/// Cumulative CTR and a 95% Wilson score interval for every variant.
/// A variant with no impressions reports the maximally uncertain [0, 1].
pub fn summarize(stats: &BTreeMap<String, VariantStatistics>) -> Vec<VariantSummary> {
    stats
        .values()
        .map(|s| {
            let (ci_lower, ci_upper) = wilson_interval(s.total_clicks, s.total_impressions);
            VariantSummary {
                variant_id: s.variant_id.clone(),
                impressions: s.total_impressions,
                clicks: s.total_clicks,
                ctr: s.ctr(),
                ci_lower,
                ci_upper,
            }
        })
        .collect()
}

/// Wilson score interval for a binomial proportion. Unlike the normal
/// approximation it stays inside [0, 1] and behaves at extreme rates.
fn wilson_interval(successes: u64, n: u64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 1.0);
    }
    let n = n as f64;
    let p = successes as f64 / n;
    let z2 = Z_95 * Z_95;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let margin = (Z_95 / denom) * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();
    ((center - margin).max(0.0), (center + margin).min(1.0))
}

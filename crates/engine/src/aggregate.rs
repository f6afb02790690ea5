//! Cumulative sufficient statistics from raw daily records.

use bandit_core::{BanditError, BanditResult, MetricRecord, VariantStatistics};
use std::collections::BTreeMap;

/// Fold all daily records of one experiment into per-variant cumulative
/// counts. Pure; recomputed on every allocation request rather than
/// maintained incrementally, so a request always sees an exact sum over
/// the fetched snapshot.
///
/// The BTreeMap keeps variants in sorted order, which fixes the posterior
/// order (and with it the sampler's tie-break) for the rest of the pipeline.
pub fn aggregate(
    experiment_id: &str,
    records: &[MetricRecord],
) -> BanditResult<BTreeMap<String, VariantStatistics>> {
    if records.is_empty() {
        return Err(BanditError::InsufficientData(experiment_id.to_string()));
    }

    let mut stats: BTreeMap<String, VariantStatistics> = BTreeMap::new();
    for record in records {
        let entry = stats
            .entry(record.variant_id.clone())
            .or_insert_with(|| VariantStatistics {
                experiment_id: experiment_id.to_string(),
                variant_id: record.variant_id.clone(),
                total_impressions: 0,
                total_clicks: 0,
            });
        entry.total_impressions += record.impressions;
        entry.total_clicks += record.clicks;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(variant: &str, day: u32, impressions: u64, clicks: u64) -> MetricRecord {
        MetricRecord {
            experiment_id: "exp-1".to_string(),
            variant_id: variant.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
            impressions,
            clicks,
        }
    }

    #[test]
    fn test_groups_and_sums_across_days() {
        let records = vec![
            record("control", 1, 1000, 50),
            record("variant", 1, 1000, 70),
            record("control", 2, 500, 30),
        ];

        let stats = aggregate("exp-1", &records).unwrap();
        assert_eq!(stats.len(), 2);

        let control = &stats["control"];
        assert_eq!(control.total_impressions, 1500);
        assert_eq!(control.total_clicks, 80);

        let variant = &stats["variant"];
        assert_eq!(variant.total_impressions, 1000);
        assert_eq!(variant.total_clicks, 70);
    }

    #[test]
    fn test_idempotent_over_same_input() {
        let records = vec![
            record("a", 1, 100, 5),
            record("b", 1, 100, 20),
            record("a", 2, 50, 2),
        ];

        let first = aggregate("exp-1", &records).unwrap();
        let second = aggregate("exp-1", &records).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_is_insufficient_data() {
        let err = aggregate("exp-1", &[]).unwrap_err();
        match err {
            BanditError::InsufficientData(id) => assert_eq!(id, "exp-1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_variants_come_out_sorted() {
        let records = vec![
            record("zeta", 1, 10, 1),
            record("alpha", 1, 10, 1),
            record("mid", 1, 10, 1),
        ];
        let stats = aggregate("exp-1", &records).unwrap();
        let order: Vec<&str> = stats.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["alpha", "mid", "zeta"]);
    }
}

//! Orchestration: fetch -> aggregate -> posteriors -> simulate -> normalize.

use crate::aggregate::aggregate;
use crate::posterior::posterior_for;
use crate::sampler::simulate;
use bandit_core::{Allocation, AllocationResult, BanditResult, MetricSource, Posterior};
use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info};

/// Computes dated traffic allocations for an experiment from the metrics a
/// [`MetricSource`] has accumulated. Stateless between calls; concurrent
/// `compute` calls share nothing but the source, which only serves reads.
pub struct AllocationEngine<S> {
    source: Arc<S>,
    trials: u32,
}

impl<S: MetricSource> AllocationEngine<S> {
    pub fn new(source: Arc<S>, trials: u32) -> Self {
        Self { source, trials }
    }

    /// Allocation for the day after `as_of`, from all records dated up to
    /// and including `as_of`, using the configured trial count and a fresh
    /// entropy-seeded generator.
    pub fn compute(&self, experiment_id: &str, as_of: NaiveDate) -> BanditResult<AllocationResult> {
        self.compute_with(experiment_id, as_of, self.trials, None)
    }

    /// Same pipeline with an explicit trial count and optional RNG seed.
    /// A seeded call is fully reproducible.
    pub fn compute_with(
        &self,
        experiment_id: &str,
        as_of: NaiveDate,
        trials: u32,
        seed: Option<u64>,
    ) -> BanditResult<AllocationResult> {
        let records = self.source.fetch_records(experiment_id, as_of);
        debug!(
            experiment_id,
            records = records.len(),
            %as_of,
            "Fetched metric records"
        );

        let stats = aggregate(experiment_id, &records)?;
        let posteriors: Vec<Posterior> = stats.values().map(posterior_for).collect();
        let wins = simulate(&posteriors, trials, seed)?;

        let mut allocations: Vec<Allocation> = wins
            .into_iter()
            .map(|(variant_id, count)| Allocation {
                variant_id,
                percentage: 100.0 * count as f64 / trials as f64,
            })
            .collect();
        // Highest share first; variant id breaks exact ties deterministically.
        allocations.sort_by(|a, b| {
            b.percentage
                .total_cmp(&a.percentage)
                .then_with(|| a.variant_id.cmp(&b.variant_id))
        });

        // The split applies to the day after the last day of observed data.
        let date = as_of
            .checked_add_days(Days::new(1))
            .ok_or_else(|| bandit_core::BanditError::InvalidParameter(format!(
                "as_of date {as_of} has no successor"
            )))?;

        info!(
            experiment_id,
            variants = allocations.len(),
            trials,
            %date,
            "Computed allocation"
        );

        Ok(AllocationResult {
            experiment_id: experiment_id.to_string(),
            date,
            allocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandit_core::{BanditError, MetricRecord};

    /// Fixed-slice metric source standing in for real storage.
    struct FixtureSource {
        records: Vec<MetricRecord>,
    }

    impl MetricSource for FixtureSource {
        fn fetch_records(&self, experiment_id: &str, up_to: NaiveDate) -> Vec<MetricRecord> {
            self.records
                .iter()
                .filter(|r| r.experiment_id == experiment_id && r.date <= up_to)
                .cloned()
                .collect()
        }
    }

    fn record(variant: &str, impressions: u64, clicks: u64) -> MetricRecord {
        MetricRecord {
            experiment_id: "ctr_test".to_string(),
            variant_id: variant.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, 22).unwrap(),
            impressions,
            clicks,
        }
    }

    fn engine(records: Vec<MetricRecord>) -> AllocationEngine<FixtureSource> {
        AllocationEngine::new(Arc::new(FixtureSource { records }), 10_000)
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 22).unwrap()
    }

    // 1. Error paths ---------------------------------------------------------

    #[test]
    fn test_no_records_is_insufficient_data() {
        let err = engine(vec![]).compute("ctr_test", as_of()).unwrap_err();
        assert!(matches!(err, BanditError::InsufficientData(_)));
    }

    #[test]
    fn test_zero_trials_propagates_invalid_parameter() {
        let err = engine(vec![record("control", 100, 5)])
            .compute_with("ctr_test", as_of(), 0, Some(1))
            .unwrap_err();
        assert!(matches!(err, BanditError::InvalidParameter(_)));
    }

    // 2. Invariants ----------------------------------------------------------

    #[test]
    fn test_percentages_sum_to_one_hundred() {
        let result = engine(vec![
            record("control", 1000, 50),
            record("variant", 1000, 70),
            record("untested", 0, 0),
        ])
        .compute_with("ctr_test", as_of(), 10_000, Some(5))
        .unwrap();

        let total: f64 = result.allocations.iter().map(|a| a.percentage).sum();
        assert!((total - 100.0).abs() < 1e-6, "sum was {total}");
        assert_eq!(result.allocations.len(), 3);
    }

    #[test]
    fn test_result_is_dated_for_the_next_day() {
        let result = engine(vec![record("control", 100, 5)])
            .compute_with("ctr_test", as_of(), 1_000, Some(1))
            .unwrap();
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2025, 12, 23).unwrap());
    }

    #[test]
    fn test_single_variant_receives_everything() {
        // Emergent: the only posterior wins every round.
        let result = engine(vec![record("control", 1000, 50)])
            .compute_with("ctr_test", as_of(), 10_000, Some(9))
            .unwrap();
        assert_eq!(result.allocations.len(), 1);
        assert_eq!(result.allocations[0].percentage, 100.0);
    }

    #[test]
    fn test_untested_variant_keeps_exploration_share() {
        // Beta(1,1) against a 5% CTR arm: the uniform prior wins most rounds.
        let result = engine(vec![record("control", 1000, 50), record("fresh", 0, 0)])
            .compute_with("ctr_test", as_of(), 10_000, Some(17))
            .unwrap();
        let fresh = result
            .allocations
            .iter()
            .find(|a| a.variant_id == "fresh")
            .unwrap();
        assert!(fresh.percentage > 0.0);
    }

    // 3. Concrete scenario ---------------------------------------------------

    #[test]
    fn test_ctr_test_scenario_prefers_the_better_variant() {
        // control 5% CTR -> Beta(51, 951); variant 7% -> Beta(71, 931).
        let result = engine(vec![
            record("control", 1000, 50),
            record("variant", 1000, 70),
        ])
        .compute_with("ctr_test", as_of(), 10_000, Some(2024))
        .unwrap();

        let pct = |id: &str| {
            result
                .allocations
                .iter()
                .find(|a| a.variant_id == id)
                .unwrap()
                .percentage
        };
        assert!(pct("variant") > pct("control"));
        assert!((pct("variant") + pct("control") - 100.0).abs() < 0.1);
        // Sorted output puts the winner first.
        assert_eq!(result.allocations[0].variant_id, "variant");
    }

    #[test]
    fn test_higher_ctr_wins_across_many_seeds() {
        let records = vec![record("control", 1000, 50), record("variant", 1000, 70)];
        let engine = engine(records);

        for seed in 0..20 {
            let result = engine
                .compute_with("ctr_test", as_of(), 10_000, Some(seed))
                .unwrap();
            let variant = result
                .allocations
                .iter()
                .find(|a| a.variant_id == "variant")
                .unwrap();
            assert!(
                variant.percentage >= 50.0,
                "seed {seed}: variant got {}",
                variant.percentage
            );
        }
    }

    #[test]
    fn test_date_filter_excludes_future_records() {
        let mut future = record("late", 1000, 900);
        future.date = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let result = engine(vec![record("control", 1000, 50), future])
            .compute_with("ctr_test", as_of(), 1_000, Some(3))
            .unwrap();
        assert_eq!(result.allocations.len(), 1);
        assert_eq!(result.allocations[0].variant_id, "control");
    }
}

//! In-process metric store backed by DashMap for lock-free concurrent access.
//! Owns the durable MetricRecord side of the system; the engine only reads
//! from it through the [`MetricSource`] trait.

use bandit_core::{BanditResult, MetricRecord, MetricSource};
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct DailyCounts {
    impressions: u64,
    clicks: u64,
}

/// Metric store keyed by experiment, with each experiment's records keyed
/// by (variant, date). Duplicate submissions for an existing
/// (experiment, variant, date) key overwrite the stored counts, matching
/// the documented ingest policy.
pub struct InMemoryMetricStore {
    experiments: DashMap<String, BTreeMap<(String, NaiveDate), DailyCounts>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self {
            experiments: DashMap::new(),
        }
    }

    /// Validate and store a single record. Overwrites any record already
    /// stored under the same (experiment, variant, date) key.
    pub fn store(&self, record: MetricRecord) -> BanditResult<()> {
        record.validate()?;
        self.store_unchecked(record);
        Ok(())
    }

    /// Validate and store one day of counts for several variants of an
    /// experiment. All records are validated before any is stored, so a
    /// rejected batch leaves the store untouched.
    pub fn store_day(&self, records: Vec<MetricRecord>) -> BanditResult<usize> {
        for record in &records {
            record.validate()?;
        }
        let stored = records.len();
        for record in records {
            self.store_unchecked(record);
        }
        Ok(stored)
    }

    fn store_unchecked(&self, record: MetricRecord) {
        let mut experiment = self
            .experiments
            .entry(record.experiment_id.clone())
            .or_default();
        let replaced = experiment
            .insert(
                (record.variant_id.clone(), record.date),
                DailyCounts {
                    impressions: record.impressions,
                    clicks: record.clicks,
                },
            )
            .is_some();
        debug!(
            experiment_id = %record.experiment_id,
            variant_id = %record.variant_id,
            date = %record.date,
            replaced,
            "Stored metric record"
        );
    }

    /// Whether any record has ever been stored for this experiment.
    pub fn experiment_exists(&self, experiment_id: &str) -> bool {
        self.experiments
            .get(experiment_id)
            .map(|e| !e.is_empty())
            .unwrap_or(false)
    }
}

impl MetricSource for InMemoryMetricStore {
    fn fetch_records(&self, experiment_id: &str, up_to: NaiveDate) -> Vec<MetricRecord> {
        let Some(experiment) = self.experiments.get(experiment_id) else {
            return Vec::new();
        };
        experiment
            .iter()
            .filter(|((_, date), _)| *date <= up_to)
            .map(|((variant_id, date), counts)| MetricRecord {
                experiment_id: experiment_id.to_string(),
                variant_id: variant_id.clone(),
                date: *date,
                impressions: counts.impressions,
                clicks: counts.clicks,
            })
            .collect()
    }
}

impl Default for InMemoryMetricStore {
    fn default() -> Self {
        Self::new()
    }
}

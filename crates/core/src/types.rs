//! Experiment metric and allocation types shared across the workspace.

use crate::error::{BanditError, BanditResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Raw daily counts for one variant of an experiment.
/// One record exists per (experiment_id, variant_id, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetricRecord {
    pub experiment_id: String,
    pub variant_id: String,
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
}

impl MetricRecord {
    /// Check the record's internal consistency before it is stored.
    pub fn validate(&self) -> BanditResult<()> {
        if self.experiment_id.is_empty() {
            return Err(BanditError::Validation(
                "experiment_id must not be empty".to_string(),
            ));
        }
        if self.variant_id.is_empty() {
            return Err(BanditError::Validation(
                "variant_id must not be empty".to_string(),
            ));
        }
        if self.clicks > self.impressions {
            return Err(BanditError::Validation(format!(
                "clicks ({}) exceed impressions ({}) for variant '{}'",
                self.clicks, self.impressions, self.variant_id
            )));
        }
        Ok(())
    }
}

/// Cumulative counts for one variant, folded from all of its daily records.
/// Derived per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStatistics {
    pub experiment_id: String,
    pub variant_id: String,
    pub total_impressions: u64,
    pub total_clicks: u64,
}

impl VariantStatistics {
    /// Observed click-through rate; 0 when nothing has been shown yet.
    pub fn ctr(&self) -> f64 {
        if self.total_impressions == 0 {
            return 0.0;
        }
        self.total_clicks as f64 / self.total_impressions as f64
    }
}

/// Beta posterior over a variant's true click-through probability.
/// alpha and beta are always >= 1 (Beta(1,1) prior plus non-negative counts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    pub variant_id: String,
    pub alpha: f64,
    pub beta: f64,
}

impl Posterior {
    /// Posterior mean of the click-through probability.
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }
}

/// Traffic share recommended for a single variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Allocation {
    pub variant_id: String,
    /// Share of traffic in [0, 100].
    pub percentage: f64,
}

/// Recommended traffic split for one experiment, dated for the day it
/// applies to (the day after the data it was computed from).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AllocationResult {
    pub experiment_id: String,
    pub date: NaiveDate,
    pub allocations: Vec<Allocation>,
}

/// Cumulative per-variant performance with a 95% Wilson score interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VariantSummary {
    pub variant_id: String,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Read side of the metric store. The engine only ever fetches; ingestion
/// goes through the concrete store.
pub trait MetricSource: Send + Sync {
    /// All records for an experiment with `date <= up_to`.
    /// Empty when nothing matches; absence of data is not an error here.
    fn fetch_records(&self, experiment_id: &str, up_to: NaiveDate) -> Vec<MetricRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(variant: &str, impressions: u64, clicks: u64) -> MetricRecord {
        MetricRecord {
            experiment_id: "exp-1".to_string(),
            variant_id: variant.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 12, 22).unwrap(),
            impressions,
            clicks,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_record() {
        assert!(record("control", 1000, 50).validate().is_ok());
        assert!(record("control", 0, 0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_clicks_over_impressions() {
        let err = record("control", 5, 10).validate().unwrap_err();
        assert!(matches!(err, BanditError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_empty_ids() {
        let mut r = record("control", 10, 1);
        r.experiment_id.clear();
        assert!(r.validate().is_err());

        let mut r = record("control", 10, 1);
        r.variant_id.clear();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_ctr_handles_zero_impressions() {
        let stats = VariantStatistics {
            experiment_id: "exp-1".to_string(),
            variant_id: "control".to_string(),
            total_impressions: 0,
            total_clicks: 0,
        };
        assert_eq!(stats.ctr(), 0.0);
    }
}

//! Conjugate Beta-Bernoulli posterior update.

use bandit_core::{Posterior, VariantStatistics};

/// Beta posterior for a variant under a uniform Beta(1,1) prior:
/// alpha = 1 + clicks, beta = 1 + (impressions - clicks).
///
/// A variant with no impressions keeps the uniform prior, which is what
/// gives untested variants their exploration baseline downstream.
pub fn posterior_for(stats: &VariantStatistics) -> Posterior {
    Posterior {
        variant_id: stats.variant_id.clone(),
        alpha: 1.0 + stats.total_clicks as f64,
        beta: 1.0 + (stats.total_impressions - stats.total_clicks) as f64,
    }
}

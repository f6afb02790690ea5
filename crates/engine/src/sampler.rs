//! Monte Carlo Thompson sampling over per-variant Beta posteriors.

use bandit_core::{BanditError, BanditResult, Posterior};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};
use std::collections::BTreeMap;

/// Run `trials` independent rounds; in each round draw one sample from
/// every posterior and award a win to the variant with the strictly
/// greatest draw. Ties go to the earliest posterior in input order, so
/// every round awards exactly one win and the counts always total `trials`.
///
/// With `seed` set the run is bit-reproducible; without it each call draws
/// from its own entropy-seeded generator. Nothing is shared between calls.
pub fn simulate(
    posteriors: &[Posterior],
    trials: u32,
    seed: Option<u64>,
) -> BanditResult<BTreeMap<String, u64>> {
    if posteriors.is_empty() {
        return Err(BanditError::InvalidParameter(
            "posterior set must not be empty".to_string(),
        ));
    }
    if trials == 0 {
        return Err(BanditError::InvalidParameter(
            "trials must be a positive integer".to_string(),
        ));
    }

    let distributions: Vec<Beta<f64>> = posteriors
        .iter()
        .map(|p| {
            Beta::new(p.alpha, p.beta).map_err(|e| {
                BanditError::InvalidParameter(format!(
                    "invalid Beta({}, {}) for variant '{}': {e}",
                    p.alpha, p.beta, p.variant_id
                ))
            })
        })
        .collect::<BanditResult<_>>()?;

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mut wins = vec![0u64; posteriors.len()];
    for _ in 0..trials {
        let mut best_idx = 0;
        let mut best_sample = f64::NEG_INFINITY;
        for (idx, dist) in distributions.iter().enumerate() {
            let sample = dist.sample(&mut rng);
            if sample > best_sample {
                best_sample = sample;
                best_idx = idx;
            }
        }
        wins[best_idx] += 1;
    }

    Ok(posteriors
        .iter()
        .zip(wins)
        .map(|(p, w)| (p.variant_id.clone(), w))
        .collect())
}

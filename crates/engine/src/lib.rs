//! Allocation engine — folds daily metrics into cumulative statistics,
//! maintains Beta posteriors per variant, and converts them into traffic
//! allocation percentages via Monte Carlo Thompson Sampling.

pub mod aggregate;
pub mod engine;
pub mod posterior;
pub mod sampler;
pub mod summary;

pub use aggregate::aggregate;
pub use engine::AllocationEngine;
pub use posterior::posterior_for;
pub use sampler::simulate;
pub use summary::summarize;

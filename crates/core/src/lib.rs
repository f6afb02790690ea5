pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{BanditError, BanditResult};
pub use types::{
    Allocation, AllocationResult, MetricRecord, MetricSource, Posterior, VariantStatistics,
    VariantSummary,
};

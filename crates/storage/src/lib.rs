#![warn(clippy::unwrap_used)]

pub mod memory;

pub use memory::InMemoryMetricStore;

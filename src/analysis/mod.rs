//! Analysis modules.
//!
//! Metric extraction, per-geography aggregation, and cross-geography
//! dataset combination, all driven by the same search tree.

pub mod aggregator;
pub mod combine;
pub mod metrics;

pub use aggregator::{compile_summary, AggregateOptions, FailurePolicy};
pub use combine::{combine_all, CombineOptions, CombinedDataset};

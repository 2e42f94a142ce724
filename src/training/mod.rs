//! Model training
//!
//! Seeded train/test split, ridge fit and regression metrics.

pub mod metrics;
pub mod trainer;

pub use metrics::RegressionMetrics;
pub use trainer::{split_indices, Trainer, TrainingReport};

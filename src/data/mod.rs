//! Data ingestion and storage
//!
//! JSON dump loading, SQLite storage, the per-run snapshot and the
//! point-in-time training dataset.

pub mod database;
pub mod dataset;
pub mod ingest;
pub mod snapshot;

pub use database::{Database, FeatureSink, MemoryFeatureStore};
pub use dataset::{DatasetSummary, TrainingDataset};
pub use ingest::DumpLoader;
pub use snapshot::{History, HistoryPrefix, Snapshot};

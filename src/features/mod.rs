//! Feature extraction
//!
//! Converts a player's past match records into model-ready features.

pub mod assembler;
pub mod context;
pub mod rolling;

pub use assembler::{Feature, FeatureAssembler, FeatureRecord, FeatureSet, FeatureValues, RollingHistory};
pub use context::{TeamContext, TeamXgContext};

//! Points regressor
//!
//! A ridge regression over the configured feature set, persisted together
//! with its ordered feature names.

pub mod linear;

pub use linear::{LinearModel, PointsModel, FEATURES_FILE, MODEL_FILE};

//! Prediction and inference
//!
//! Load the trained model and rank players for a gameweek.

pub mod inference;

pub use inference::{format_csv, format_table, next_gameweek, GameweekPredictions, Predictor};

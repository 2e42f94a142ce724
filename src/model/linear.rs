//! Ridge regression on standardised features
//!
//! The artifact directory holds two files:
//! - `model.json`: means, stds, coefficients, intercept and rolling window
//! - `features.txt`: the ordered feature names, one per line
//!
//! `features.txt` is what the inference driver reads to build vectors, and
//! it must agree with the names inside `model.json`.

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{FplError, Result};

pub const MODEL_FILE: &str = "model.json";
pub const FEATURES_FILE: &str = "features.txt";

/// A trained points regressor
pub trait PointsModel {
    /// Ordered names of the expected input vector
    fn feature_names(&self) -> &[String];

    /// Rolling window the training features were computed with
    fn window(&self) -> usize;

    /// Predicted points for one feature vector
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub window: usize,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    /// Coefficients in standardised units
    pub coeffs: Vec<f64>,
    pub intercept: f64,
    pub l2: f64,
    #[serde(default)]
    pub train_samples: usize,
}

impl LinearModel {
    /// Fit `y ~ x` with an L2 penalty on the standardised coefficients.
    /// The intercept is the label mean and is not penalised.
    pub fn fit(
        feature_names: Vec<String>,
        window: usize,
        x: &[Vec<f64>],
        y: &[f64],
        l2: f64,
    ) -> Result<Self> {
        let n = x.len();
        let p = feature_names.len();
        if n == 0 || n != y.len() {
            return Err(FplError::InsufficientData(format!(
                "cannot fit on {} rows and {} labels",
                n,
                y.len()
            )));
        }
        if let Some(row) = x.iter().find(|row| row.len() != p) {
            return Err(FplError::Parse(format!(
                "expected {} features per row, got {}",
                p,
                row.len()
            )));
        }

        let records = Array2::from_shape_vec((n, p), x.concat())
            .map_err(|e| FplError::Parse(e.to_string()))?;
        let targets = Array1::from_vec(y.to_vec());

        let means = records
            .mean_axis(Axis(0))
            .ok_or_else(|| FplError::InsufficientData("no rows to standardise".to_string()))?;
        // Constant columns stay at zero after centring
        let stds = records
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let standardised = (&records - &means) / &stds;

        let intercept = targets.mean().unwrap_or(0.0);
        let centred = &targets - intercept;

        // Ridge as plain least squares over rows extended with sqrt(l2) * I
        let penalty = Array2::<f64>::eye(p) * l2.max(0.0).sqrt();
        let zeros = Array1::<f64>::zeros(p);
        let augmented = concatenate(Axis(0), &[standardised.view(), penalty.view()])
            .map_err(|e| FplError::Parse(e.to_string()))?;
        let augmented_targets = concatenate(Axis(0), &[centred.view(), zeros.view()])
            .map_err(|e| FplError::Parse(e.to_string()))?;

        let fitted = LinearRegression::new()
            .with_intercept(false)
            .fit(&Dataset::new(augmented, augmented_targets))
            .map_err(|e| {
                FplError::InsufficientData(format!(
                    "ridge fit failed ({}); use a positive l2 penalty",
                    e
                ))
            })?;

        let coeffs = fitted.params().to_vec();
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(FplError::InsufficientData(
                "feature matrix is singular; use a positive l2 penalty".to_string(),
            ));
        }

        Ok(LinearModel {
            feature_names,
            window,
            feature_means: means.to_vec(),
            feature_stds: stds.to_vec(),
            coeffs,
            intercept,
            l2,
            train_samples: n,
        })
    }

    /// Feature names with their standardised coefficients, largest effect first
    pub fn importances(&self) -> Vec<(&str, f64)> {
        let mut pairs: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .map(String::as_str)
            .zip(self.coeffs.iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        pairs
    }

    /// Write `model.json` and `features.txt` into `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(MODEL_FILE), json)?;

        let mut names = self.feature_names.join("\n");
        names.push('\n');
        std::fs::write(dir.join(FEATURES_FILE), names)?;

        log::info!("Saved model with {} features to {}", self.feature_names.len(), dir.display());
        Ok(())
    }

    /// Load the artifact pair, checking that both agree on feature order
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let model_path = dir.join(MODEL_FILE);
        let features_path = dir.join(FEATURES_FILE);

        for path in [&model_path, &features_path] {
            if !path.exists() {
                return Err(FplError::NoModel(path.display().to_string()));
            }
        }

        let model: LinearModel = serde_json::from_str(&std::fs::read_to_string(&model_path)?)?;
        let listed: Vec<String> = std::fs::read_to_string(&features_path)?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        if listed != model.feature_names {
            return Err(FplError::FeatureMismatch {
                expected: model.feature_names,
                found: listed,
            });
        }

        let p = model.feature_names.len();
        if model.coeffs.len() != p || model.feature_means.len() != p || model.feature_stds.len() != p
        {
            return Err(FplError::Parse(format!(
                "{} is inconsistent: {} features, {} coefficients",
                model_path.display(),
                p,
                model.coeffs.len()
            )));
        }
        if model.window == 0 {
            return Err(FplError::Parse(format!(
                "{} has a zero rolling window",
                model_path.display()
            )));
        }

        Ok(model)
    }
}

impl PointsModel for LinearModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn window(&self) -> usize {
        self.window
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coeffs.len() {
            return Err(FplError::Parse(format!(
                "expected {} features, got {}",
                self.coeffs.len(),
                features.len()
            )));
        }
        let score = features
            .iter()
            .zip(&self.feature_means)
            .zip(&self.feature_stds)
            .zip(&self.coeffs)
            .map(|(((x, m), s), w)| w * (x - m) / s)
            .sum::<f64>();
        Ok(self.intercept + score)
    }
}

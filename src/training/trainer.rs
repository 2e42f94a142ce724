//! Model fitting and evaluation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;

use crate::data::dataset::TrainingDataset;
use crate::features::FeatureSet;
use crate::model::{LinearModel, PointsModel};
use crate::training::metrics::RegressionMetrics;
use crate::{FplError, Result, TrainingConfig};

/// Outcome of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: LinearModel,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Features: {} (window {})",
            self.model.feature_names.len(),
            self.model.window
        )?;
        writeln!(f, "Train  {}", self.train)?;
        writeln!(f, "Test   {}", self.test)?;
        writeln!(f, "\nFeature importance (standardised coefficients):")?;
        for (name, coeff) in self.model.importances() {
            writeln!(f, "  {:<26} {:>+8.3}", name, coeff)?;
        }
        Ok(())
    }
}

/// Seeded shuffle split into (train, test) row indices
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = test_size.clamp(0.0, 1.0);
    let mut n_test = (n as f64 * test_size).ceil() as usize;
    if n_test >= n && n > 0 {
        n_test = n - 1;
    }

    let test = indices.split_off(n - n_test);
    (indices, test)
}

/// Fits the ridge regressor on a training dataset
pub struct Trainer {
    config: TrainingConfig,
    feature_set: FeatureSet,
}

impl Trainer {
    pub fn new(config: TrainingConfig, feature_set: FeatureSet) -> Self {
        Trainer {
            config,
            feature_set,
        }
    }

    /// Train on the rows that carry every selected feature
    pub fn train(&self, dataset: &TrainingDataset) -> Result<TrainingReport> {
        let (x, y) = dataset.matrix(&self.feature_set);
        self.train_matrix(&x, &y, dataset.window())
    }

    /// `window` is the rolling window the rows were built with; it is saved
    /// with the model so inference rebuilds features the same way.
    pub fn train_matrix(&self, x: &[Vec<f64>], y: &[f64], window: usize) -> Result<TrainingReport> {
        if x.len() < 2 {
            return Err(FplError::InsufficientData(format!(
                "{} complete rows; need at least 2 to train and evaluate",
                x.len()
            )));
        }

        let (train_idx, test_idx) = split_indices(x.len(), self.config.test_size, self.config.seed);
        log::info!(
            "Split {} rows: train={}, test={}",
            x.len(),
            train_idx.len(),
            test_idx.len()
        );

        let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
            idx.iter().map(|&i| (x[i].clone(), y[i])).unzip()
        };
        let (train_x, train_y) = pick(&train_idx);
        let (test_x, test_y) = pick(&test_idx);

        let names = self
            .feature_set
            .names()
            .into_iter()
            .map(String::from)
            .collect();
        let model = LinearModel::fit(names, window, &train_x, &train_y, self.config.l2)?;

        let train = evaluate(&model, &train_x, &train_y)?;
        let test = evaluate(&model, &test_x, &test_y)?;
        log::info!("Train {}", train);
        log::info!("Test  {}", test);

        Ok(TrainingReport { model, train, test })
    }
}

fn evaluate<M: PointsModel>(model: &M, x: &[Vec<f64>], y: &[f64]) -> Result<RegressionMetrics> {
    let predictions = x
        .iter()
        .map(|row| model.predict(row))
        .collect::<Result<Vec<_>>>()?;
    Ok(RegressionMetrics::compute(&predictions, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;

    fn config() -> TrainingConfig {
        TrainingConfig {
            test_size: 0.2,
            seed: 42,
            l2: 1e-6,
        }
    }

    #[test]
    fn test_split_is_reproducible_and_disjoint() {
        let (train_a, test_a) = split_indices(50, 0.2, 42);
        let (train_b, test_b) = split_indices(50, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 10);

        let mut all: Vec<usize> = train_a.iter().chain(&test_a).copied().collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());

        let (_, other_test) = split_indices(50, 0.2, 7);
        assert_ne!(test_a, other_test);
    }

    #[test]
    fn test_split_keeps_a_training_row() {
        let (train, test) = split_indices(2, 0.9, 1);
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_train_matrix_fits_relation() {
        let set = FeatureSet::new(vec![Feature::Form, Feature::IsHome]);
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 10) as f64, (i % 2) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 1.0 + 0.5 * r[0] + 2.0 * r[1]).collect();

        let report = Trainer::new(config(), set).train_matrix(&x, &y, 4).unwrap();
        assert_eq!(report.model.feature_names, vec!["form", "is_home"]);
        assert_eq!(report.model.window, 4);
        assert_eq!(report.train.samples + report.test.samples, 40);
        assert!(report.test.mae < 1e-3);
        assert!(report.test.r2 > 0.999);

        let printed = report.to_string();
        assert!(printed.contains("Feature importance"));
        // form spreads wider, so its standardised effect ranks first
        assert!(printed.find("form") < printed.find("is_home"));
    }

    #[test]
    fn test_too_few_rows() {
        let trainer = Trainer::new(config(), FeatureSet::basic());
        assert!(matches!(
            trainer.train_matrix(&[vec![0.0; 8]], &[1.0], 5),
            Err(FplError::InsufficientData(_))
        ));
    }
}

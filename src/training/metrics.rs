//! Regression metrics

use std::fmt;

/// Error summary of predictions against realised points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegressionMetrics {
    /// Mean absolute error
    pub mae: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Coefficient of determination; 0.0 when the labels are constant
    pub r2: f64,
    pub samples: usize,
}

impl RegressionMetrics {
    pub fn compute(predictions: &[f64], actuals: &[f64]) -> Self {
        let n = predictions.len().min(actuals.len());
        if n == 0 {
            return Self::default();
        }

        let pairs = predictions.iter().zip(actuals).take(n);
        let (mut abs_sum, mut sq_sum) = (0.0, 0.0);
        for (p, a) in pairs {
            abs_sum += (p - a).abs();
            sq_sum += (p - a).powi(2);
        }

        let mean = actuals[..n].iter().sum::<f64>() / n as f64;
        let total: f64 = actuals[..n].iter().map(|a| (a - mean).powi(2)).sum();

        RegressionMetrics {
            mae: abs_sum / n as f64,
            rmse: (sq_sum / n as f64).sqrt(),
            r2: if total > 0.0 { 1.0 - sq_sum / total } else { 0.0 },
            samples: n,
        }
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MAE: {:.3} | RMSE: {:.3} | R²: {:.3} (n={})",
            self.mae, self.rmse, self.r2, self.samples
        )
    }
}

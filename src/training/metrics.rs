//! Regression metrics

use crate::error::{AutoRegError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Test-split metrics of a fitted regressor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetricArtifact {
    pub r2_score: f64,
    pub rmse: f64,
    pub mse: f64,
}

impl RegressionMetricArtifact {
    /// Compute MSE, RMSE and R² of `y_pred` against `y_true`.
    ///
    /// R² is 0 when the targets have no variance.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(AutoRegError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(AutoRegError::ValidationError(
                "cannot score an empty prediction set".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let ss_res: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum();
        let mse = ss_res / n;

        let y_mean = y_true.sum() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let r2_score = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self {
            r2_score,
            rmse: mse.sqrt(),
            mse,
        })
    }
}

/// R² only, as used to rank cross-validation folds
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    RegressionMetricArtifact::compute(y_true, y_pred).map(|m| m.r2_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetricArtifact::compute(&y_true, &y_pred).unwrap();
        assert!((metrics.mse - 0.006).abs() < 1e-12);
        assert!((metrics.rmse - 0.006f64.sqrt()).abs() < 1e-12);
        assert!((metrics.r2_score - 0.997).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_scores_zero() {
        let y = array![3.0, 3.0, 3.0];
        let metrics = RegressionMetricArtifact::compute(&y, &array![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(metrics.r2_score, 0.0);
        assert!((metrics.mse - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        let result = r2_score(&array![1.0, 2.0], &array![1.0]);
        assert!(matches!(result, Err(AutoRegError::ShapeError { .. })));
    }
}

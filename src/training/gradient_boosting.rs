//! Gradient boosted regression trees with squared-error loss

use super::decision_tree::{DecisionTreeRegressor, MaxFeatures};
use crate::error::{AutoRegError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Gradient boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn for each tree
    pub subsample: f64,
    pub max_features: MaxFeatures,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_features: MaxFeatures::All,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(AutoRegError::invalid_parameter(
                "n_estimators",
                self.n_estimators,
                "must be at least 1",
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(AutoRegError::invalid_parameter(
                "learning_rate",
                self.learning_rate,
                "must be positive",
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(AutoRegError::invalid_parameter(
                "subsample",
                self.subsample,
                "must be within (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Gradient boosting regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
    train_loss: Vec<f64>,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
            train_loss: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.config.validate()?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(AutoRegError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AutoRegError::TrainingError("cannot boost on zero rows".to_string()));
        }

        self.trees.clear();
        self.train_loss.clear();
        self.feature_importances = vec![0.0; n_features];
        self.initial_prediction = y.mean().unwrap_or(0.0);

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let sample_size = ((n_samples as f64 * self.config.subsample).ceil() as usize).clamp(1, n_samples);

        for round in 0..self.config.n_estimators {
            // negative gradient of squared error
            let residuals = y - &predictions;

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_max_features(self.config.max_features)
                .with_random_state(self.config.random_state.wrapping_add(round as u64));

            if sample_size < n_samples {
                let mut rows: Vec<usize> = (0..n_samples).collect();
                rows.shuffle(&mut rng);
                rows.truncate(sample_size);
                rows.sort_unstable();
                tree.fit(&x.select(Axis(0), &rows), &residuals.select(Axis(0), &rows))?;
            } else {
                tree.fit(x, &residuals)?;
            }

            let update = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            if let Some(imp) = tree.feature_importances() {
                for (acc, v) in self.feature_importances.iter_mut().zip(imp.iter()) {
                    *acc += v;
                }
            }

            let mse = (y - &predictions).mapv(|r| r * r).mean().unwrap_or(0.0);
            self.train_loss.push(mse);
            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            self.feature_importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(AutoRegError::ModelNotFitted);
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Training MSE after each boosting round
    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

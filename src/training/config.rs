//! Trainer configuration

use super::model::{ModelType, ParamGrid};
use super::search::validate_grid;
use crate::error::{AutoRegError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for candidate search and model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Folds used to score each hyperparameter combination
    pub cv_folds: usize,
    /// Model families to try, in report order
    pub candidates: Vec<ModelType>,
    /// Per-model replacements for the default grids
    pub param_grids: BTreeMap<ModelType, ParamGrid>,
    /// Minimum test R² the best model must reach
    pub expected_score: Option<f64>,
    pub random_state: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            cv_folds: 3,
            candidates: ModelType::all(),
            param_grids: BTreeMap::new(),
            expected_score: None,
            random_state: 42,
        }
    }
}

impl TrainerConfig {
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<ModelType>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_param_grid(mut self, model: ModelType, grid: ParamGrid) -> Self {
        self.param_grids.insert(model, grid);
        self
    }

    pub fn with_expected_score(mut self, score: f64) -> Self {
        self.expected_score = Some(score);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Grid searched for `model`: the override if present, else the default
    pub fn grid_for(&self, model: ModelType) -> ParamGrid {
        self.param_grids
            .get(&model)
            .cloned()
            .unwrap_or_else(|| model.default_grid())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(AutoRegError::invalid_parameter(
                "cv_folds",
                self.cv_folds,
                "must be at least 2",
            ));
        }
        if self.candidates.is_empty() {
            return Err(AutoRegError::ConfigError("no candidate models configured".to_string()));
        }
        if let Some(score) = self.expected_score {
            if !score.is_finite() {
                return Err(AutoRegError::invalid_parameter(
                    "expected_score",
                    score,
                    "must be finite",
                ));
            }
        }
        for (model, grid) in &self.param_grids {
            validate_grid(*model, grid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn test_defaults() {
        let config = TrainerConfig::default();
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.candidates.len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grid_override() {
        let grid: ParamGrid = [("alpha".to_string(), vec![ParamValue::Float(3.0)])].into_iter().collect();
        let config = TrainerConfig::default().with_param_grid(ModelType::Ridge, grid.clone());
        assert_eq!(config.grid_for(ModelType::Ridge), grid);
        assert_eq!(config.grid_for(ModelType::Lasso), ModelType::Lasso.default_grid());
    }

    #[test]
    fn test_bad_override_rejected() {
        let grid: ParamGrid = [("gamma".to_string(), vec![ParamValue::Float(3.0)])].into_iter().collect();
        let config = TrainerConfig::default().with_param_grid(ModelType::Ridge, grid);
        assert!(matches!(config.validate(), Err(AutoRegError::InvalidParameter { .. })));
    }

    #[test]
    fn test_json_partial() {
        let config: TrainerConfig = serde_json::from_str(
            r#"{"cv_folds": 5, "candidates": ["Ridge", "KNeighborsRegressor"],
                "param_grids": {"Ridge": {"alpha": [0.5, 2]}}}"#,
        )
        .unwrap();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.candidates, vec![ModelType::Ridge, ModelType::KNeighborsRegressor]);
        assert_eq!(
            config.grid_for(ModelType::Ridge)["alpha"],
            vec![ParamValue::Float(0.5), ParamValue::Int(2)]
        );
        assert_eq!(config.random_state, 42);
    }

    #[test]
    fn test_invalid_folds() {
        assert!(TrainerConfig::default().with_cv_folds(1).validate().is_err());
    }
}

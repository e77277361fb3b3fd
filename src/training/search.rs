//! Exhaustive grid search scored by k-fold cross-validated R²

use super::cross_validation::{CVResults, KFold};
use super::metrics::r2_score;
use super::model::{ModelType, ParamGrid};
use crate::error::{AutoRegError, Result};
use crate::params::Params;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// Every combination of the grid's values, keys varying slowest in key order.
///
/// An empty grid yields a single empty combination.
pub fn expand_grid(grid: &ParamGrid) -> Vec<Params> {
    let mut combos = vec![Params::new()];
    for (key, values) in grid {
        combos = combos
            .into_iter()
            .flat_map(|base| {
                values.iter().map(move |v| {
                    let mut next = base.clone();
                    next.insert(key.clone(), v.clone());
                    next
                })
            })
            .collect();
    }
    combos
}

/// Reject grids naming hyperparameters `model` does not accept, or listing no values
pub fn validate_grid(model: ModelType, grid: &ParamGrid) -> Result<()> {
    let accepted = model.accepted_params();
    for (key, values) in grid {
        if !accepted.contains(&key.as_str()) {
            return Err(AutoRegError::invalid_parameter(
                key.as_str(),
                format!("{:?}", values),
                format!("unknown hyperparameter for {}", model.name()),
            ));
        }
        if values.is_empty() {
            return Err(AutoRegError::invalid_parameter(
                key.as_str(),
                "[]",
                "grid needs at least one value",
            ));
        }
    }
    Ok(())
}

/// Winning combination of a search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_params: Params,
    /// Mean fold R²; `None` when the data was too small to cross-validate
    pub cv_score: Option<f64>,
}

/// Grid search for one model family
#[derive(Debug, Clone)]
pub struct GridSearch {
    model: ModelType,
    cv_folds: usize,
    random_state: u64,
}

impl GridSearch {
    pub fn new(model: ModelType, cv_folds: usize, random_state: u64) -> Self {
        Self {
            model,
            cv_folds,
            random_state,
        }
    }

    /// Score every combination and keep the one with the highest mean fold R².
    ///
    /// Ties keep the earlier combination. A combination whose folds fail to fit is
    /// skipped; if all of them fail the last error is returned.
    pub fn search(&self, grid: &ParamGrid, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        validate_grid(self.model, grid)?;
        let combos = expand_grid(grid);
        let n_samples = x.nrows();
        let n_folds = self.cv_folds.min(n_samples);

        if n_folds < 2 {
            debug!(model = %self.model, n_samples, "too few rows to cross-validate, using first combination");
            return Ok(SearchOutcome {
                best_params: combos.into_iter().next().unwrap_or_default(),
                cv_score: None,
            });
        }

        let splits = KFold::new(n_folds)
            .with_random_state(self.random_state)
            .split(n_samples)?;

        let mut best: Option<(Params, f64)> = None;
        let mut last_error = None;

        for params in combos {
            // an unknown or ill-typed value is a configuration error, not a bad fold
            let template = self.model.build(&params, self.random_state)?;

            let scores = splits
                .iter()
                .map(|split| {
                    let mut model = template.clone();
                    model.fit(
                        &x.select(Axis(0), &split.train_indices),
                        &y.select(Axis(0), &split.train_indices),
                    )?;
                    let pred = model.predict(&x.select(Axis(0), &split.test_indices))?;
                    r2_score(&y.select(Axis(0), &split.test_indices), &pred)
                })
                .collect::<Result<Vec<_>>>();

            let cv = match scores {
                Ok(scores) => CVResults::from_scores(scores),
                Err(e) => {
                    debug!(model = %self.model, ?params, error = %e, "combination failed");
                    last_error = Some(e);
                    continue;
                }
            };
            debug!(model = %self.model, ?params, mean = cv.mean_score, std = cv.std_score, "cv scored");

            let score = if cv.mean_score.is_nan() { f64::NEG_INFINITY } else { cv.mean_score };
            let improves = match &best {
                None => true,
                Some((_, best_score)) => score > *best_score,
            };
            if improves {
                best = Some((params, score));
            }
        }

        match best {
            Some((best_params, cv_score)) => Ok(SearchOutcome {
                best_params,
                cv_score: Some(cv_score),
            }),
            None => Err(last_error.unwrap_or_else(|| {
                AutoRegError::TrainingError(format!("no combination could be scored for {}", self.model))
            })),
        }
    }
}

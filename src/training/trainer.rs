//! Model selection over the candidate regressors

use super::config::TrainerConfig;
use super::metrics::RegressionMetricArtifact;
use super::model::{ModelType, TrainedModel};
use super::search::GridSearch;
use crate::error::{AutoRegError, Result};
use crate::params::Params;
use crate::pipeline::{PipelineStage, StageArtifact};
use crate::transformation::TransformationArtifact;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of one candidate, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub model_name: String,
    pub best_params: Params,
    /// Mean fold R² of `best_params`
    pub cv_score: Option<f64>,
    /// Metrics on the held-out test split
    pub test_metrics: Option<RegressionMetricArtifact>,
    pub training_time_secs: f64,
    pub error: Option<String>,
}

impl ModelReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Output of the training stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub best_model_name: String,
    pub trained_model: TrainedModel,
    pub best_model_parameters: Params,
    pub train_metric_artifact: RegressionMetricArtifact,
    /// One entry per candidate, in candidate order
    pub models_report: Vec<ModelReport>,
}

impl StageArtifact for ModelTrainerArtifact {
    const STAGE: PipelineStage = PipelineStage::Training;
}

/// Searches, refits and evaluates every configured candidate
pub struct ModelTrainer<'a> {
    artifact: &'a TransformationArtifact,
    config: TrainerConfig,
}

struct CandidateOutcome {
    report: ModelReport,
    model: Option<TrainedModel>,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(artifact: &'a TransformationArtifact) -> Self {
        Self {
            artifact,
            config: TrainerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TrainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train every candidate in parallel and keep the one with the best test R².
    ///
    /// NaN scores rank lowest and ties keep the earlier candidate.
    pub fn train_model(&self) -> Result<ModelTrainerArtifact> {
        self.config.validate()?;
        let start = Instant::now();
        info!(
            candidates = self.config.candidates.len(),
            train_rows = self.artifact.x_train.nrows(),
            test_rows = self.artifact.x_test.nrows(),
            features = self.artifact.n_features(),
            "Starting model training"
        );

        let outcomes: Vec<CandidateOutcome> = self
            .config
            .candidates
            .par_iter()
            .map(|model| self.train_candidate(*model))
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for (idx, outcome) in outcomes.iter().enumerate() {
            let Some(metrics) = outcome.report.test_metrics else {
                continue;
            };
            let score = if metrics.r2_score.is_nan() {
                f64::NEG_INFINITY
            } else {
                metrics.r2_score
            };
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        let mut models_report = Vec::with_capacity(outcomes.len());
        let mut winner = None;
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            if best.is_some_and(|(b, _)| b == idx) {
                winner = outcome.model.map(|m| (m, outcome.report.clone()));
            }
            models_report.push(outcome.report);
        }

        let (trained_model, report) = winner.ok_or_else(|| {
            let reasons: Vec<String> = models_report
                .iter()
                .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {}", r.model_name, e)))
                .collect();
            AutoRegError::TrainingError(format!("every candidate failed ({})", reasons.join("; ")))
        })?;
        let metrics = report.test_metrics.ok_or(AutoRegError::ModelNotFitted)?;

        info!(
            best_model = %report.model_name,
            r2 = metrics.r2_score,
            rmse = metrics.rmse,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Model training complete"
        );

        if let Some(threshold) = self.config.expected_score {
            if !(metrics.r2_score >= threshold) {
                return Err(AutoRegError::NoAcceptableModel {
                    model: report.model_name,
                    score: metrics.r2_score,
                    threshold,
                });
            }
        }

        Ok(ModelTrainerArtifact {
            best_model_name: report.model_name,
            trained_model,
            best_model_parameters: report.best_params,
            train_metric_artifact: metrics,
            models_report,
        })
    }

    fn train_candidate(&self, model_type: ModelType) -> CandidateOutcome {
        let start = Instant::now();
        let mut report = ModelReport {
            model_name: model_type.name().to_string(),
            best_params: Params::new(),
            cv_score: None,
            test_metrics: None,
            training_time_secs: 0.0,
            error: None,
        };

        let result = self.fit_candidate(model_type, &mut report);
        report.training_time_secs = start.elapsed().as_secs_f64();

        match result {
            Ok((model, metrics)) => {
                info!(
                    model = %model_type,
                    r2 = metrics.r2_score,
                    rmse = metrics.rmse,
                    cv_score = ?report.cv_score,
                    elapsed_secs = report.training_time_secs,
                    "Candidate trained"
                );
                report.test_metrics = Some(metrics);
                CandidateOutcome {
                    report,
                    model: Some(model),
                }
            }
            Err(e) => {
                warn!(model = %model_type, error = %e, "Candidate failed");
                report.error = Some(e.to_string());
                CandidateOutcome { report, model: None }
            }
        }
    }

    fn fit_candidate(
        &self,
        model_type: ModelType,
        report: &mut ModelReport,
    ) -> Result<(TrainedModel, RegressionMetricArtifact)> {
        let a = self.artifact;
        let grid = self.config.grid_for(model_type);
        let outcome = GridSearch::new(model_type, self.config.cv_folds, self.config.random_state)
            .search(&grid, &a.x_train, &a.y_train)?;
        report.best_params = outcome.best_params;
        report.cv_score = outcome.cv_score;

        let mut model = model_type.build(&report.best_params, self.config.random_state)?;
        model.fit(&a.x_train, &a.y_train)?;
        let pred = model.predict(&a.x_test)?;
        let metrics = RegressionMetricArtifact::compute(&a.y_test, &pred)?;
        Ok((model, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use ndarray::{Array1, Array2};

    fn linear_artifact() -> TransformationArtifact {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 7) % 5) as f64 });
        let y: Array1<f64> = x.rows().into_iter().map(|r| 2.0 * r[0] - r[1] + 1.0).collect();
        let train: Vec<usize> = (0..40).filter(|i| i % 5 != 0).collect();
        let test: Vec<usize> = (0..40).filter(|i| i % 5 == 0).collect();
        TransformationArtifact::from_arrays(
            x.select(ndarray::Axis(0), &train),
            y.select(ndarray::Axis(0), &train),
            x.select(ndarray::Axis(0), &test),
            y.select(ndarray::Axis(0), &test),
            "y",
        )
        .unwrap()
    }

    fn fast_config() -> TrainerConfig {
        TrainerConfig::default().with_candidates(vec![
            ModelType::LinearRegression,
            ModelType::Ridge,
            ModelType::DecisionTreeRegressor,
            ModelType::KNeighborsRegressor,
        ])
    }

    #[test]
    fn test_linear_target_selects_linear_model() {
        let artifact = linear_artifact();
        let result = ModelTrainer::new(&artifact).with_config(fast_config()).train_model().unwrap();

        assert!(result.train_metric_artifact.r2_score > 0.999);
        assert!(result.best_model_name == "LinearRegression" || result.best_model_name == "Ridge");
        assert_eq!(result.trained_model.name(), result.best_model_name);

        let names: Vec<&str> = result.models_report.iter().map(|r| r.model_name.as_str()).collect();
        assert_eq!(names, vec!["LinearRegression", "Ridge", "DecisionTreeRegressor", "KNeighborsRegressor"]);
        assert!(result.models_report.iter().all(|r| r.succeeded()));
    }

    #[test]
    fn test_ties_keep_earlier_candidate() {
        let artifact = linear_artifact();
        let config = TrainerConfig::default()
            .with_candidates(vec![ModelType::LinearRegression, ModelType::Ridge])
            .with_param_grid(
                ModelType::Ridge,
                [("alpha".to_string(), vec![ParamValue::Float(0.0)])].into_iter().collect(),
            );
        let result = ModelTrainer::new(&artifact).with_config(config).train_model().unwrap();
        assert_eq!(result.best_model_name, "LinearRegression");
    }

    #[test]
    fn test_nan_score_ranks_below_finite_score() {
        let clean = linear_artifact();
        let mut x_test = clean.x_test.clone();
        // linear predictions turn NaN on this row, tree routing does not
        x_test[[0, 0]] = f64::NAN;
        let artifact = TransformationArtifact::from_arrays(
            clean.x_train.clone(),
            clean.y_train.clone(),
            x_test,
            clean.y_test.clone(),
            "y",
        )
        .unwrap();

        let config = TrainerConfig::default()
            .with_candidates(vec![ModelType::LinearRegression, ModelType::DecisionTreeRegressor]);
        let result = ModelTrainer::new(&artifact).with_config(config).train_model().unwrap();

        let linear = result.models_report[0].test_metrics.unwrap();
        assert!(linear.r2_score.is_nan());
        assert_eq!(result.best_model_name, "DecisionTreeRegressor");
        assert!(result.train_metric_artifact.r2_score.is_finite());
    }

    #[test]
    fn test_expected_score_not_met() {
        let artifact = linear_artifact();
        let config = TrainerConfig::default()
            .with_candidates(vec![ModelType::KNeighborsRegressor])
            .with_expected_score(1.5);
        let err = ModelTrainer::new(&artifact).with_config(config).train_model().unwrap_err();
        assert!(matches!(err, AutoRegError::NoAcceptableModel { threshold, .. } if threshold == 1.5));
    }

    #[test]
    fn test_failed_candidate_is_reported() {
        let artifact = linear_artifact();
        let config = TrainerConfig::default()
            .with_candidates(vec![ModelType::ElasticNet, ModelType::LinearRegression])
            .with_param_grid(
                ModelType::ElasticNet,
                [("l1_ratio".to_string(), vec![ParamValue::Float(2.0)])].into_iter().collect(),
            );
        let result = ModelTrainer::new(&artifact).with_config(config).train_model().unwrap();

        assert_eq!(result.best_model_name, "LinearRegression");
        assert!(result.models_report[0].error.is_some());
        assert!(result.models_report[0].test_metrics.is_none());
    }

    #[test]
    fn test_all_candidates_fail() {
        let artifact = linear_artifact();
        let config = TrainerConfig::default()
            .with_candidates(vec![ModelType::Ridge])
            .with_param_grid(
                ModelType::Ridge,
                [("alpha".to_string(), vec![ParamValue::Float(-1.0)])].into_iter().collect(),
            );
        let err = ModelTrainer::new(&artifact).with_config(config).train_model().unwrap_err();
        assert!(matches!(err, AutoRegError::TrainingError(_)));
    }

    #[test]
    fn test_unknown_grid_key() {
        let artifact = linear_artifact();
        let config = TrainerConfig::default().with_param_grid(
            ModelType::Lasso,
            [("n_estimators".to_string(), vec![ParamValue::Int(3)])].into_iter().collect(),
        );
        let err = ModelTrainer::new(&artifact).with_config(config).train_model().unwrap_err();
        assert!(matches!(err, AutoRegError::InvalidParameter { .. }));
    }
}

//! Candidate regressors: names, default grids, construction from params

use super::decision_tree::{DecisionTreeRegressor, MaxFeatures};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
use super::linear_models::{ElasticNetRegression, LassoRegression, LinearRegression, RidgeRegression};
use super::random_forest::RandomForestRegressor;
use crate::error::{AutoRegError, Result};
use crate::params::{get_bool, get_f64, get_str, get_usize, ParamValue, Params};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Hyperparameter name to the values searched for it
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// Regressor families the trainer can search over, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelType {
    LinearRegression,
    Ridge,
    Lasso,
    ElasticNet,
    DecisionTreeRegressor,
    RandomForestRegressor,
    GradientBoostingRegressor,
    KNeighborsRegressor,
}

impl ModelType {
    pub const ALL: [ModelType; 8] = [
        ModelType::LinearRegression,
        ModelType::Ridge,
        ModelType::Lasso,
        ModelType::ElasticNet,
        ModelType::DecisionTreeRegressor,
        ModelType::RandomForestRegressor,
        ModelType::GradientBoostingRegressor,
        ModelType::KNeighborsRegressor,
    ];

    pub fn all() -> Vec<ModelType> {
        Self::ALL.to_vec()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelType::LinearRegression => "LinearRegression",
            ModelType::Ridge => "Ridge",
            ModelType::Lasso => "Lasso",
            ModelType::ElasticNet => "ElasticNet",
            ModelType::DecisionTreeRegressor => "DecisionTreeRegressor",
            ModelType::RandomForestRegressor => "RandomForestRegressor",
            ModelType::GradientBoostingRegressor => "GradientBoostingRegressor",
            ModelType::KNeighborsRegressor => "KNeighborsRegressor",
        }
    }

    /// Hyperparameter names `build` understands
    pub fn accepted_params(&self) -> &'static [&'static str] {
        match self {
            ModelType::LinearRegression => &["fit_intercept"],
            ModelType::Ridge => &["alpha", "fit_intercept"],
            ModelType::Lasso => &["alpha", "fit_intercept", "max_iter", "tol"],
            ModelType::ElasticNet => &["alpha", "l1_ratio", "fit_intercept", "max_iter", "tol"],
            ModelType::DecisionTreeRegressor => &[
                "max_depth",
                "min_samples_split",
                "min_samples_leaf",
                "max_features",
                "random_state",
            ],
            ModelType::RandomForestRegressor => &[
                "n_estimators",
                "max_depth",
                "min_samples_split",
                "min_samples_leaf",
                "max_features",
                "bootstrap",
                "random_state",
            ],
            ModelType::GradientBoostingRegressor => &[
                "n_estimators",
                "learning_rate",
                "max_depth",
                "min_samples_leaf",
                "subsample",
                "max_features",
                "random_state",
            ],
            ModelType::KNeighborsRegressor => &["n_neighbors", "weights", "metric", "p"],
        }
    }

    pub fn default_grid(&self) -> ParamGrid {
        fn grid(entries: Vec<(&str, Vec<ParamValue>)>) -> ParamGrid {
            entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
        }

        match self {
            ModelType::LinearRegression => grid(vec![("fit_intercept", vec![true.into()])]),
            ModelType::Ridge => grid(vec![("alpha", vec![0.1.into(), 1.0.into(), 10.0.into()])]),
            ModelType::Lasso => grid(vec![(
                "alpha",
                vec![0.001.into(), 0.01.into(), 0.1.into(), 1.0.into()],
            )]),
            ModelType::ElasticNet => grid(vec![
                ("alpha", vec![0.01.into(), 0.1.into(), 1.0.into()]),
                ("l1_ratio", vec![0.2.into(), 0.5.into(), 0.8.into()]),
            ]),
            ModelType::DecisionTreeRegressor => grid(vec![
                ("max_depth", vec![4.into(), 8.into(), "none".into()]),
                ("min_samples_leaf", vec![1.into(), 5.into()]),
            ]),
            ModelType::RandomForestRegressor => grid(vec![
                ("n_estimators", vec![50.into(), 100.into()]),
                ("max_depth", vec![8.into(), "none".into()]),
            ]),
            ModelType::GradientBoostingRegressor => grid(vec![
                ("n_estimators", vec![50.into(), 100.into()]),
                ("learning_rate", vec![0.05.into(), 0.1.into()]),
                ("max_depth", vec![3.into()]),
            ]),
            ModelType::KNeighborsRegressor => grid(vec![
                ("n_neighbors", vec![3.into(), 5.into(), 7.into()]),
                ("weights", vec!["uniform".into(), "distance".into()]),
            ]),
        }
    }

    fn check_param_names(&self, params: &Params) -> Result<()> {
        let accepted = self.accepted_params();
        match params.iter().find(|(k, _)| !accepted.contains(&k.as_str())) {
            Some((key, value)) => Err(AutoRegError::invalid_parameter(
                key.as_str(),
                value,
                format!("unknown hyperparameter for {}", self.name()),
            )),
            None => Ok(()),
        }
    }

    /// Construct an unfitted model from `params`; absent keys keep model defaults.
    ///
    /// `random_state` seeds stochastic models unless `params` overrides it.
    pub fn build(&self, params: &Params, random_state: u64) -> Result<TrainedModel> {
        self.check_param_names(params)?;
        let seed = match params.get("random_state") {
            Some(v) => v.as_i64().map(|i| i as u64).ok_or_else(|| {
                AutoRegError::invalid_parameter("random_state", v, "expected an integer")
            })?,
            None => random_state,
        };

        let model = match self {
            ModelType::LinearRegression => {
                let mut m = LinearRegression::new();
                if let Some(fi) = get_bool(params, "fit_intercept")? {
                    m = m.with_fit_intercept(fi);
                }
                TrainedModel::LinearRegression(m)
            }
            ModelType::Ridge => {
                let mut m = RidgeRegression::new(get_f64(params, "alpha")?.unwrap_or(1.0));
                if let Some(fi) = get_bool(params, "fit_intercept")? {
                    m = m.with_fit_intercept(fi);
                }
                TrainedModel::Ridge(m)
            }
            ModelType::Lasso => {
                let mut m = LassoRegression::new(get_f64(params, "alpha")?.unwrap_or(1.0));
                if let Some(fi) = get_bool(params, "fit_intercept")? {
                    m.fit_intercept = fi;
                }
                if let Some(it) = get_usize(params, "max_iter")? {
                    m = m.with_max_iter(it);
                }
                if let Some(tol) = get_f64(params, "tol")? {
                    m = m.with_tol(tol);
                }
                TrainedModel::Lasso(m)
            }
            ModelType::ElasticNet => {
                let mut m = ElasticNetRegression::new(
                    get_f64(params, "alpha")?.unwrap_or(1.0),
                    get_f64(params, "l1_ratio")?.unwrap_or(0.5),
                );
                if let Some(fi) = get_bool(params, "fit_intercept")? {
                    m.fit_intercept = fi;
                }
                if let Some(it) = get_usize(params, "max_iter")? {
                    m = m.with_max_iter(it);
                }
                if let Some(tol) = get_f64(params, "tol")? {
                    m.tol = tol;
                }
                TrainedModel::ElasticNet(m)
            }
            ModelType::DecisionTreeRegressor => {
                let mut m = DecisionTreeRegressor::new().with_random_state(seed);
                if let Some(depth) = get_max_depth(params)? {
                    m = m.with_max_depth(depth);
                }
                if let Some(n) = get_usize(params, "min_samples_split")? {
                    m = m.with_min_samples_split(n);
                }
                if let Some(n) = get_usize(params, "min_samples_leaf")? {
                    m = m.with_min_samples_leaf(n);
                }
                if let Some(mf) = get_max_features(params)? {
                    m = m.with_max_features(mf);
                }
                TrainedModel::DecisionTreeRegressor(m)
            }
            ModelType::RandomForestRegressor => {
                let n_estimators = get_usize(params, "n_estimators")?.unwrap_or(100);
                let mut m = RandomForestRegressor::new(n_estimators).with_random_state(seed);
                if let Some(depth) = get_max_depth(params)? {
                    m = m.with_max_depth(depth);
                }
                if let Some(n) = get_usize(params, "min_samples_split")? {
                    m = m.with_min_samples_split(n);
                }
                if let Some(n) = get_usize(params, "min_samples_leaf")? {
                    m = m.with_min_samples_leaf(n);
                }
                if let Some(mf) = get_max_features(params)? {
                    m = m.with_max_features(mf);
                }
                if let Some(b) = get_bool(params, "bootstrap")? {
                    m = m.with_bootstrap(b);
                }
                TrainedModel::RandomForestRegressor(m)
            }
            ModelType::GradientBoostingRegressor => {
                let defaults = GradientBoostingConfig::default();
                let max_depth = match get_max_depth(params)? {
                    Some(Some(d)) => d,
                    Some(None) => {
                        return Err(AutoRegError::invalid_parameter(
                            "max_depth",
                            "none",
                            "boosted trees need a finite depth",
                        ))
                    }
                    None => defaults.max_depth,
                };
                let config = GradientBoostingConfig {
                    n_estimators: get_usize(params, "n_estimators")?.unwrap_or(defaults.n_estimators),
                    learning_rate: get_f64(params, "learning_rate")?.unwrap_or(defaults.learning_rate),
                    max_depth,
                    min_samples_leaf: get_usize(params, "min_samples_leaf")?
                        .unwrap_or(defaults.min_samples_leaf),
                    subsample: get_f64(params, "subsample")?.unwrap_or(defaults.subsample),
                    max_features: get_max_features(params)?.unwrap_or(defaults.max_features),
                    random_state: seed,
                };
                TrainedModel::GradientBoostingRegressor(GradientBoostingRegressor::new(config))
            }
            ModelType::KNeighborsRegressor => {
                let mut config = KNNConfig::default();
                if let Some(k) = get_usize(params, "n_neighbors")? {
                    config.n_neighbors = k;
                }
                if let Some(w) = get_str(params, "weights")? {
                    config.weights = WeightScheme::parse(w).ok_or_else(|| {
                        AutoRegError::invalid_parameter("weights", w, "expected uniform or distance")
                    })?;
                }
                if let Some(metric) = get_str(params, "metric")? {
                    config.metric = match metric.trim().to_ascii_lowercase().as_str() {
                        "minkowski" => DistanceMetric::Minkowski(get_f64(params, "p")?.unwrap_or(2.0)),
                        _ => DistanceMetric::parse(metric).ok_or_else(|| {
                            AutoRegError::invalid_parameter(
                                "metric",
                                metric,
                                "expected euclidean, manhattan or minkowski",
                            )
                        })?,
                    };
                } else if let Some(p) = get_f64(params, "p")? {
                    config.metric = DistanceMetric::Minkowski(p);
                }
                TrainedModel::KNeighborsRegressor(KNNRegressor::new(config))
            }
        };

        Ok(model)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = AutoRegError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let model = match normalized.as_str() {
            "linearregression" | "linear" | "ols" => ModelType::LinearRegression,
            "ridge" | "ridgeregression" => ModelType::Ridge,
            "lasso" | "lassoregression" => ModelType::Lasso,
            "elasticnet" | "elasticnetregression" => ModelType::ElasticNet,
            "decisiontreeregressor" | "decisiontree" | "tree" => ModelType::DecisionTreeRegressor,
            "randomforestregressor" | "randomforest" | "rf" => ModelType::RandomForestRegressor,
            "gradientboostingregressor" | "gradientboosting" | "gbr" => {
                ModelType::GradientBoostingRegressor
            }
            "kneighborsregressor" | "knn" | "kneighbors" => ModelType::KNeighborsRegressor,
            _ => {
                return Err(AutoRegError::ConfigError(format!(
                    "unknown model type '{}'",
                    s
                )))
            }
        };
        Ok(model)
    }
}

/// `max_depth`: a positive integer, or `"none"` for unlimited
fn get_max_depth(params: &Params) -> Result<Option<Option<usize>>> {
    match params.get("max_depth") {
        None => Ok(None),
        Some(ParamValue::String(s)) if matches!(s.trim().to_ascii_lowercase().as_str(), "none" | "null") => {
            Ok(Some(None))
        }
        Some(v) => match v.as_i64() {
            Some(d) if d > 0 => Ok(Some(Some(d as usize))),
            _ => Err(AutoRegError::invalid_parameter(
                "max_depth",
                v,
                "expected a positive integer or \"none\"",
            )),
        },
    }
}

fn get_max_features(params: &Params) -> Result<Option<MaxFeatures>> {
    let parsed = match params.get("max_features") {
        None => return Ok(None),
        Some(ParamValue::Int(n)) if *n > 0 => Some(MaxFeatures::Fixed(*n as usize)),
        Some(ParamValue::Float(f)) if *f > 0.0 && *f <= 1.0 => Some(MaxFeatures::Fraction(*f)),
        Some(ParamValue::String(s)) => MaxFeatures::parse(s),
        Some(_) => None,
    };
    match parsed {
        Some(mf) => Ok(Some(mf)),
        None => Err(AutoRegError::invalid_parameter(
            "max_features",
            params.get("max_features").map(|v| v.to_string()).unwrap_or_default(),
            "expected sqrt, log2, all, a count or a fraction in (0, 1]",
        )),
    }
}

/// A regressor of any supported family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LinearRegression(LinearRegression),
    Ridge(RidgeRegression),
    Lasso(LassoRegression),
    ElasticNet(ElasticNetRegression),
    DecisionTreeRegressor(DecisionTreeRegressor),
    RandomForestRegressor(RandomForestRegressor),
    GradientBoostingRegressor(GradientBoostingRegressor),
    KNeighborsRegressor(KNNRegressor),
}

impl TrainedModel {
    pub fn model_type(&self) -> ModelType {
        match self {
            TrainedModel::LinearRegression(_) => ModelType::LinearRegression,
            TrainedModel::Ridge(_) => ModelType::Ridge,
            TrainedModel::Lasso(_) => ModelType::Lasso,
            TrainedModel::ElasticNet(_) => ModelType::ElasticNet,
            TrainedModel::DecisionTreeRegressor(_) => ModelType::DecisionTreeRegressor,
            TrainedModel::RandomForestRegressor(_) => ModelType::RandomForestRegressor,
            TrainedModel::GradientBoostingRegressor(_) => ModelType::GradientBoostingRegressor,
            TrainedModel::KNeighborsRegressor(_) => ModelType::KNeighborsRegressor,
        }
    }

    pub fn name(&self) -> &'static str {
        self.model_type().name()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            TrainedModel::LinearRegression(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::Ridge(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::Lasso(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::ElasticNet(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::DecisionTreeRegressor(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::RandomForestRegressor(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::GradientBoostingRegressor(m) => m.fit(x, y).map(|_| ()),
            TrainedModel::KNeighborsRegressor(m) => m.fit(x, y).map(|_| ()),
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::LinearRegression(m) => m.predict(x),
            TrainedModel::Ridge(m) => m.predict(x),
            TrainedModel::Lasso(m) => m.predict(x),
            TrainedModel::ElasticNet(m) => m.predict(x),
            TrainedModel::DecisionTreeRegressor(m) => m.predict(x),
            TrainedModel::RandomForestRegressor(m) => m.predict(x),
            TrainedModel::GradientBoostingRegressor(m) => m.predict(x),
            TrainedModel::KNeighborsRegressor(m) => m.predict(x),
        }
    }
}

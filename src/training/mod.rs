//! Model training
//!
//! Regressors available to the trainer:
//! - Linear models (OLS, Ridge, Lasso, ElasticNet)
//! - Decision trees and random forests
//! - Gradient boosted trees
//! - K-nearest neighbours
//!
//! [`ModelTrainer`] grid-searches each candidate with k-fold cross-validation,
//! refits the winner on the training split and scores it on the test split.

mod config;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod metrics;
mod model;
pub mod random_forest;
pub mod search;
mod trainer;

pub use config::TrainerConfig;
pub use cross_validation::{CVResults, CVSplit, KFold};
pub use decision_tree::{DecisionTreeRegressor, MaxFeatures, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::{ElasticNetRegression, LassoRegression, LinearRegression, RidgeRegression};
pub use metrics::RegressionMetricArtifact;
pub use model::{ModelType, ParamGrid, TrainedModel};
pub use random_forest::RandomForestRegressor;
pub use search::{GridSearch, SearchOutcome};
pub use trainer::{ModelReport, ModelTrainer, ModelTrainerArtifact};

//! autoreg - automated regression pipeline
//!
//! Given a dataset, its file format and a target column, [`AutoRegression`]
//! loads the data, preprocesses it, searches over several regressors and
//! returns the best one with its test metrics.
//!
//! ```no_run
//! use autoreg::prelude::*;
//!
//! let params: Params = [("sep".to_string(), ParamValue::from(";"))].into_iter().collect();
//! let result = AutoRegression::new("houses.csv", "csv", "price", params).train_model()?;
//! println!("{} r2={:.3}", result.best_model_name, result.r2_score);
//! # Ok::<(), autoreg::AutoRegError>(())
//! ```
//!
//! # Modules
//!
//! - [`ingestion`] - CSV, TSV, Parquet and JSON loading via polars
//! - [`transformation`] - target extraction, train/test split, imputation, encoding, scaling
//! - [`training`] - regressors, grid search with cross-validation, model selection
//! - [`pipeline`] - the [`AutoRegression`] facade and its stage seam
//! - [`config`] - JSON-loadable settings for the transformation and training stages
//! - [`cli`] - the `autoreg` command-line interface

pub mod error;
pub mod params;

pub mod ingestion;
pub mod training;
pub mod transformation;

pub mod config;
pub mod pipeline;

pub mod cli;

pub use config::AutoRegressionConfig;
pub use error::{AutoRegError, Result};
pub use params::{ParamValue, Params};
pub use pipeline::{AutoRegression, FittedPipeline, PipelineRun, PipelineStages, RegressionResult};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::AutoRegressionConfig;
    pub use crate::error::{AutoRegError, Result};
    pub use crate::params::{ParamValue, Params};

    pub use crate::ingestion::{DataIngestion, FileType, IngestionArtifact, IngestionOptions};
    pub use crate::transformation::{
        DataTransformation, FittedPreprocessor, ImputeStrategy, ScalerType, TransformationArtifact,
        TransformationConfig,
    };
    pub use crate::training::{
        ModelReport, ModelTrainer, ModelTrainerArtifact, ModelType, RegressionMetricArtifact,
        TrainedModel, TrainerConfig,
    };

    pub use crate::pipeline::{
        AutoRegression, DefaultStages, FittedPipeline, PipelineRun, PipelineStage, PipelineStages,
        RegressionResult, StageArtifact,
    };
}

//! The `AutoRegression` facade
//!
//! Runs ingestion, transformation and training in strict sequence and
//! repackages the trainer output as a flat [`RegressionResult`]. The three
//! stages sit behind the [`PipelineStages`] trait so they can be replaced.

use crate::config::AutoRegressionConfig;
use crate::error::Result;
use crate::ingestion::{DataIngestion, IngestionArtifact};
use crate::params::Params;
use crate::training::{ModelTrainer, ModelTrainerArtifact, TrainedModel};
use crate::transformation::{DataTransformation, FittedPreprocessor, TransformationArtifact};
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, info_span};
use uuid::Uuid;

/// Stage that produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Ingestion,
    Transformation,
    Training,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Ingestion => "ingestion",
            PipelineStage::Transformation => "transformation",
            PipelineStage::Training => "training",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output record of one pipeline stage
pub trait StageArtifact {
    const STAGE: PipelineStage;
}

/// The three collaborators the facade sequences
pub trait PipelineStages {
    fn ingest(&self, path: &str, file_type: &str, params: &Params) -> Result<IngestionArtifact>;

    fn transform(&self, ingestion: &IngestionArtifact, target_column: &str) -> Result<TransformationArtifact>;

    fn train(&self, transformation: &TransformationArtifact) -> Result<ModelTrainerArtifact>;
}

/// Stages backed by [`DataIngestion`], [`DataTransformation`] and [`ModelTrainer`]
#[derive(Debug, Clone, Default)]
pub struct DefaultStages {
    pub config: AutoRegressionConfig,
}

impl DefaultStages {
    pub fn new(config: AutoRegressionConfig) -> Self {
        Self { config }
    }
}

impl PipelineStages for DefaultStages {
    fn ingest(&self, path: &str, file_type: &str, params: &Params) -> Result<IngestionArtifact> {
        DataIngestion::new(path, file_type, params)?.run_data_ingestion()
    }

    fn transform(&self, ingestion: &IngestionArtifact, target_column: &str) -> Result<TransformationArtifact> {
        DataTransformation::new(ingestion, target_column)
            .with_config(self.config.transformation.clone())
            .run_data_transformation()
    }

    fn train(&self, transformation: &TransformationArtifact) -> Result<ModelTrainerArtifact> {
        ModelTrainer::new(transformation)
            .with_config(self.config.trainer.clone())
            .train_model()
    }
}

/// Flat summary of the winning model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionResult {
    pub best_model_name: String,
    pub model: TrainedModel,
    pub model_params: Params,
    pub r2_score: f64,
    pub rmse: f64,
    pub mse: f64,
}

impl From<&ModelTrainerArtifact> for RegressionResult {
    fn from(artifact: &ModelTrainerArtifact) -> Self {
        Self {
            best_model_name: artifact.best_model_name.clone(),
            model: artifact.trained_model.clone(),
            model_params: artifact.best_model_parameters.clone(),
            r2_score: artifact.train_metric_artifact.r2_score,
            rmse: artifact.train_metric_artifact.rmse,
            mse: artifact.train_metric_artifact.mse,
        }
    }
}

/// Every artifact of one pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub ingestion: IngestionArtifact,
    pub transformation: TransformationArtifact,
    pub trainer: ModelTrainerArtifact,
}

impl PipelineRun {
    pub fn result(&self) -> RegressionResult {
        RegressionResult::from(&self.trainer)
    }

    /// Apply the fitted preprocessing and the winning model to new rows
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.transformation.preprocessor.transform(df)?;
        self.trainer.trained_model.predict(&x)
    }

    /// Everything needed to predict later, detached from the training data
    pub fn export(&self) -> FittedPipeline {
        let preprocessor = self.transformation.preprocessor.clone();
        FittedPipeline {
            target_column: self.transformation.target_column.clone(),
            feature_columns: preprocessor.input_columns().into_iter().map(String::from).collect(),
            preprocessor,
            best_model_name: self.trainer.best_model_name.clone(),
            model: self.trainer.trained_model.clone(),
        }
    }
}

/// Serializable preprocessing plus model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub target_column: String,
    /// Source columns the preprocessor reads
    pub feature_columns: Vec<String>,
    pub preprocessor: FittedPreprocessor,
    pub best_model_name: String,
    pub model: TrainedModel,
}

impl FittedPipeline {
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform(df)?;
        self.model.predict(&x)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let pipeline: Self = serde_json::from_str(&json)?;
        Ok(pipeline)
    }
}

/// Automated regression over one dataset.
///
/// Construction only stores its inputs; validation happens in the stages.
/// Each call to [`train_model`](Self::train_model) or [`run`](Self::run)
/// executes all three stages again.
#[derive(Debug, Clone)]
pub struct AutoRegression<S = DefaultStages> {
    path: String,
    filetype: String,
    target_column: String,
    params: Params,
    stages: S,
}

impl AutoRegression<DefaultStages> {
    pub fn new(
        path: impl Into<String>,
        filetype: impl Into<String>,
        target_column: impl Into<String>,
        params: Params,
    ) -> Self {
        Self {
            path: path.into(),
            filetype: filetype.into(),
            target_column: target_column.into(),
            params,
            stages: DefaultStages::default(),
        }
    }

    pub fn with_config(mut self, config: AutoRegressionConfig) -> Self {
        self.stages = DefaultStages::new(config);
        self
    }
}

impl<S: PipelineStages> AutoRegression<S> {
    /// Replace the collaborators
    pub fn with_stages<T: PipelineStages>(self, stages: T) -> AutoRegression<T> {
        AutoRegression {
            path: self.path,
            filetype: self.filetype,
            target_column: self.target_column,
            params: self.params,
            stages,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filetype(&self) -> &str {
        &self.filetype
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn stages(&self) -> &S {
        &self.stages
    }

    /// Run ingestion, transformation and training, keeping every artifact
    pub fn run(&self) -> Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        let span = info_span!("auto_regression", %run_id);
        let _guard = span.enter();
        let start = Instant::now();

        info!(
            path = %self.path,
            filetype = %self.filetype,
            target_column = %self.target_column,
            "Starting regression pipeline"
        );

        let ingestion = timed(|| self.stages.ingest(&self.path, &self.filetype, &self.params))?;
        let transformation = timed(|| self.stages.transform(&ingestion, &self.target_column))?;
        let trainer = timed(|| self.stages.train(&transformation))?;

        info!(
            best_model = %trainer.best_model_name,
            r2 = trainer.train_metric_artifact.r2_score,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Regression pipeline complete"
        );

        Ok(PipelineRun {
            run_id,
            ingestion,
            transformation,
            trainer,
        })
    }

    /// Run the pipeline and return the winning model with its test metrics
    pub fn train_model(&self) -> Result<RegressionResult> {
        Ok(self.run()?.result())
    }
}

fn timed<A: StageArtifact>(stage: impl FnOnce() -> Result<A>) -> Result<A> {
    let start = Instant::now();
    let artifact = stage()?;
    debug!(stage = %A::STAGE, elapsed_ms = start.elapsed().as_millis() as u64, "Stage complete");
    Ok(artifact)
}

//! Data transformation stage
//!
//! Separates the target column, splits rows into train and test sets and
//! turns the remaining columns into a numeric feature matrix. Every fitted
//! statistic comes from the training rows only.

mod encoder;
mod imputer;
mod preprocessor;
mod scaler;
mod split;

pub use encoder::OneHotEncoder;
pub use imputer::{most_frequent_category, ImputeStrategy};
pub use preprocessor::{FeatureKind, FeatureStep, FittedPreprocessor, PreprocessorSettings, RawFeature};
pub use scaler::{ScalerParams, ScalerType};
pub use split::{test_count, train_test_split, SplitIndices};

use crate::error::{AutoRegError, Result};
use crate::ingestion::IngestionArtifact;
use crate::pipeline::{PipelineStage, StageArtifact};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the transformation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationConfig {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Seed for the train/test shuffle
    pub random_state: u64,
    /// Shuffle rows before splitting
    pub shuffle: bool,
    /// Strategy for missing numeric values
    pub numeric_imputation: ImputeStrategy,
    /// Scaler applied to numeric features
    pub scaler: ScalerType,
    /// Categorical columns with more categories than this are dropped
    pub max_onehot_categories: usize,
    /// Columns removed before feature extraction
    pub drop_columns: Vec<String>,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            shuffle: true,
            numeric_imputation: ImputeStrategy::Median,
            scaler: ScalerType::Standard,
            max_onehot_categories: 20,
            drop_columns: Vec::new(),
        }
    }
}

impl TransformationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_numeric_imputation(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_imputation = strategy;
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn with_max_onehot_categories(mut self, max: usize) -> Self {
        self.max_onehot_categories = max;
        self
    }

    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(AutoRegError::invalid_parameter(
                "test_size",
                self.test_size,
                "must be strictly between 0 and 1",
            ));
        }
        Ok(())
    }

    fn preprocessor_settings(&self) -> PreprocessorSettings {
        PreprocessorSettings {
            numeric_imputation: self.numeric_imputation.clone(),
            scaler: self.scaler,
            max_onehot_categories: self.max_onehot_categories,
        }
    }
}

/// Output of the transformation stage
#[derive(Debug, Clone)]
pub struct TransformationArtifact {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub feature_names: Vec<String>,
    pub target_column: String,
    pub preprocessor: FittedPreprocessor,
}

impl TransformationArtifact {
    /// Build an artifact from matrices that are already numeric and split
    pub fn from_arrays(
        x_train: Array2<f64>,
        y_train: Array1<f64>,
        x_test: Array2<f64>,
        y_test: Array1<f64>,
        target_column: impl Into<String>,
    ) -> Result<Self> {
        if x_train.nrows() != y_train.len() || x_test.nrows() != y_test.len() {
            return Err(AutoRegError::ShapeError {
                expected: "one target value per row".to_string(),
                actual: format!(
                    "train {}x{} / {}, test {}x{} / {}",
                    x_train.nrows(),
                    x_train.ncols(),
                    y_train.len(),
                    x_test.nrows(),
                    x_test.ncols(),
                    y_test.len()
                ),
            });
        }
        if x_train.ncols() != x_test.ncols() {
            return Err(AutoRegError::ShapeError {
                expected: format!("{} test columns", x_train.ncols()),
                actual: x_test.ncols().to_string(),
            });
        }

        let feature_names: Vec<String> = (0..x_train.ncols()).map(|i| format!("x{i}")).collect();
        let preprocessor = FittedPreprocessor::passthrough(&feature_names);

        Ok(Self {
            x_train,
            x_test,
            y_train,
            y_test,
            feature_names,
            target_column: target_column.into(),
            preprocessor,
        })
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }
}

impl StageArtifact for TransformationArtifact {
    const STAGE: PipelineStage = PipelineStage::Transformation;
}

/// Turns an ingested dataframe into train/test matrices
#[derive(Debug, Clone)]
pub struct DataTransformation<'a> {
    ingestion: &'a IngestionArtifact,
    target_column: String,
    config: TransformationConfig,
}

impl<'a> DataTransformation<'a> {
    pub fn new(ingestion: &'a IngestionArtifact, target_column: impl Into<String>) -> Self {
        Self {
            ingestion,
            target_column: target_column.into(),
            config: TransformationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TransformationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn run_data_transformation(&self) -> Result<TransformationArtifact> {
        let start = Instant::now();
        self.config.validate()?;
        let df = &self.ingestion.dataframe;

        info!(target_column = %self.target_column, rows = df.height(), "Starting data transformation");

        let target = df
            .column(&self.target_column)
            .map_err(|_| AutoRegError::TargetNotFound(self.target_column.clone()))?;
        let target = target.as_materialized_series().cast(&DataType::Float64)?;
        let target: Vec<Option<f64>> = target
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        let kept_rows: Vec<usize> = target
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect();
        let dropped = target.len() - kept_rows.len();
        if dropped > 0 {
            warn!(dropped, "Dropping rows with missing target");
        }
        if kept_rows.is_empty() {
            return Err(AutoRegError::DataError(format!(
                "target column '{}' has no usable values",
                self.target_column
            )));
        }

        let columns = self.extract_features(df, &kept_rows)?;
        let y: Vec<f64> = kept_rows.iter().filter_map(|&i| target[i]).collect();

        let split = train_test_split(
            kept_rows.len(),
            self.config.test_size,
            self.config.shuffle,
            self.config.random_state,
        )?;
        debug!(train = split.train.len(), test = split.test.len(), "Split rows");

        let train_columns: Vec<(String, RawFeature)> = columns
            .iter()
            .map(|(name, raw)| (name.clone(), raw.take(&split.train)))
            .collect();
        let test_columns: Vec<(String, RawFeature)> = columns
            .iter()
            .map(|(name, raw)| (name.clone(), raw.take(&split.test)))
            .collect();

        let preprocessor =
            FittedPreprocessor::fit(&train_columns, &self.config.preprocessor_settings())?;
        let x_train = preprocessor.transform_raw(&train_columns)?;
        let x_test = preprocessor.transform_raw(&test_columns)?;

        let y_train: Array1<f64> = split.train.iter().map(|&i| y[i]).collect();
        let y_test: Array1<f64> = split.test.iter().map(|&i| y[i]).collect();

        info!(
            n_features = preprocessor.n_features(),
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Data transformation complete"
        );

        Ok(TransformationArtifact {
            x_train,
            x_test,
            y_train,
            y_test,
            feature_names: preprocessor.feature_names().to_vec(),
            target_column: self.target_column.clone(),
            preprocessor,
        })
    }

    /// Read every usable feature column, restricted to `rows`
    fn extract_features(&self, df: &DataFrame, rows: &[usize]) -> Result<Vec<(String, RawFeature)>> {
        for name in &self.config.drop_columns {
            if df.column(name).is_err() {
                warn!(column = %name, "Column listed in drop_columns is not present");
            }
        }

        let mut columns = Vec::new();
        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == self.target_column || self.config.drop_columns.iter().any(|d| d == name) {
                continue;
            }
            let Some(kind) = FeatureKind::of(column.dtype()) else {
                warn!(column = %name, dtype = %column.dtype(), "Skipping column with unsupported dtype");
                continue;
            };
            let raw = RawFeature::read(df, name, kind)?;
            columns.push((name.to_string(), raw.take(rows)));
        }

        if columns.is_empty() {
            return Err(AutoRegError::DataError(
                "no usable feature columns besides the target".to_string(),
            ));
        }
        Ok(columns)
    }
}

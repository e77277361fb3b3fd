//! Data ingestion stage
//!
//! Loads a dataset from disk into a polars [`DataFrame`] and records a small
//! summary of what was read.

mod loader;
mod options;

pub use loader::{write_csv, DataLoader};
pub use options::{IngestionOptions, DEFAULT_INFER_SCHEMA_LENGTH};

use crate::error::{AutoRegError, Result};
use crate::params::Params;
use crate::pipeline::{PipelineStage, StageArtifact};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

/// Supported on-disk formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Tsv,
    Parquet,
    Json,
    NdJson,
}

impl FileType {
    /// Infer the file type from a path's extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| AutoRegError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }

    /// CSV and TSV share the delimited-text reader
    pub fn is_delimited(&self) -> bool {
        matches!(self, FileType::Csv | FileType::Tsv)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Tsv => "tsv",
            FileType::Parquet => "parquet",
            FileType::Json => "json",
            FileType::NdJson => "ndjson",
        }
    }
}

impl FromStr for FileType {
    type Err = AutoRegError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "csv" => Ok(FileType::Csv),
            "tsv" => Ok(FileType::Tsv),
            "parquet" | "pq" => Ok(FileType::Parquet),
            "json" => Ok(FileType::Json),
            "jsonl" | "ndjson" => Ok(FileType::NdJson),
            _ => Err(AutoRegError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-column summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
}

/// Shape and column overview of an ingested dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
}

impl DatasetSummary {
    pub fn from_dataframe(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| ColumnSummary {
                name: c.name().to_string(),
                dtype: c.dtype().to_string(),
                null_count: c.null_count(),
            })
            .collect();

        Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }
}

/// Output of the ingestion stage
#[derive(Debug, Clone)]
pub struct IngestionArtifact {
    pub source: PathBuf,
    pub file_type: FileType,
    pub dataframe: DataFrame,
    pub summary: DatasetSummary,
    pub ingested_at: DateTime<Utc>,
}

impl IngestionArtifact {
    /// Wrap an in-memory dataframe, e.g. one built with `df!`
    pub fn from_dataframe(source: impl Into<PathBuf>, file_type: FileType, dataframe: DataFrame) -> Self {
        let summary = DatasetSummary::from_dataframe(&dataframe);
        Self {
            source: source.into(),
            file_type,
            dataframe,
            summary,
            ingested_at: Utc::now(),
        }
    }
}

impl StageArtifact for IngestionArtifact {
    const STAGE: PipelineStage = PipelineStage::Ingestion;
}

/// Loads one dataset according to its file type and reader options
#[derive(Debug, Clone)]
pub struct DataIngestion {
    path: PathBuf,
    file_type: FileType,
    options: IngestionOptions,
}

impl DataIngestion {
    /// Validate the file type and params up front; no I/O happens here.
    pub fn new(path: impl Into<PathBuf>, file_type: &str, params: &Params) -> Result<Self> {
        let file_type: FileType = file_type.parse()?;
        let options = IngestionOptions::from_params(params, file_type)?;
        Ok(Self {
            path: path.into(),
            file_type,
            options,
        })
    }

    pub fn with_options(mut self, options: IngestionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    pub fn run_data_ingestion(&self) -> Result<IngestionArtifact> {
        let start = Instant::now();
        info!(path = %self.path.display(), file_type = %self.file_type, "Starting data ingestion");

        let dataframe = DataLoader::new().load(&self.path, self.file_type, &self.options)?;

        if dataframe.height() == 0 || dataframe.width() == 0 {
            return Err(AutoRegError::DataError(format!(
                "{} contains no data ({} rows, {} columns)",
                self.path.display(),
                dataframe.height(),
                dataframe.width()
            )));
        }

        let artifact = IngestionArtifact::from_dataframe(self.path.clone(), self.file_type, dataframe);

        info!(
            rows = artifact.summary.n_rows,
            cols = artifact.summary.n_cols,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Data ingestion complete"
        );

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use std::io::Write;

    #[test]
    fn test_file_type_parse() {
        assert_eq!("CSV".parse::<FileType>().unwrap(), FileType::Csv);
        assert_eq!(".pq".parse::<FileType>().unwrap(), FileType::Parquet);
        assert_eq!("jsonl".parse::<FileType>().unwrap(), FileType::NdJson);
        assert!(matches!(
            "xlsx".parse::<FileType>(),
            Err(AutoRegError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(FileType::from_path("data/train.tsv").unwrap(), FileType::Tsv);
        assert!(FileType::from_path("data/no_extension").is_err());
    }

    #[test]
    fn test_run_data_ingestion() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "x;y").unwrap();
        writeln!(file, "1;2").unwrap();
        writeln!(file, "3;").unwrap();

        let mut params = Params::new();
        params.insert("sep".to_string(), ParamValue::from(";"));

        let artifact = DataIngestion::new(file.path(), "csv", &params)
            .unwrap()
            .run_data_ingestion()
            .unwrap();

        assert_eq!(artifact.summary.n_rows, 2);
        assert_eq!(artifact.summary.n_cols, 2);
        assert_eq!(artifact.summary.columns[1].null_count, 1);
        assert_eq!(artifact.file_type, FileType::Csv);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "x,y").unwrap();

        let err = DataIngestion::new(file.path(), "csv", &Params::new())
            .unwrap()
            .run_data_ingestion()
            .unwrap_err();
        assert!(matches!(err, AutoRegError::DataError(_)));
    }

    #[test]
    fn test_new_rejects_unsupported_format() {
        let err = DataIngestion::new("a.xlsx", "xlsx", &Params::new()).unwrap_err();
        assert!(matches!(err, AutoRegError::UnsupportedFormat(_)));
    }
}

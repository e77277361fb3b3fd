//! Format-specific readers backed by polars

use super::{FileType, IngestionOptions};
use crate::error::{AutoRegError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Reads datasets from disk into a polars [`DataFrame`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DataLoader;

impl DataLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load `path` as `file_type`, applying row limits and column selection.
    pub fn load(
        &self,
        path: &Path,
        file_type: FileType,
        options: &IngestionOptions,
    ) -> Result<DataFrame> {
        let file = open(path)?;

        let df = match file_type {
            FileType::Csv | FileType::Tsv => self.load_delimited(file, options)?,
            FileType::Parquet => ParquetReader::new(file).finish()?,
            FileType::Json => JsonReader::new(file)
                .with_json_format(JsonFormat::Json)
                .finish()?,
            FileType::NdJson => JsonReader::new(file)
                .with_json_format(JsonFormat::JsonLines)
                .finish()?,
        };

        let df = match options.n_rows {
            // the CSV reader already stopped at n_rows
            Some(n) if !file_type.is_delimited() => df.head(Some(n)),
            _ => df,
        };

        let df = match &options.columns {
            Some(columns) => select_columns(&df, columns)?,
            None => df,
        };

        debug!(rows = df.height(), cols = df.width(), "Loaded dataframe");
        Ok(df)
    }

    fn load_delimited(&self, file: File, options: &IngestionOptions) -> Result<DataFrame> {
        let parse_opts = CsvParseOptions::default().with_separator(options.separator);

        let df = CsvReadOptions::default()
            .with_has_header(options.has_header)
            .with_skip_rows(options.skip_rows)
            .with_infer_schema_length(options.infer_schema_length)
            .with_n_rows(options.n_rows)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        Ok(df)
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| AutoRegError::DataError(format!("{}: {e}", path.display())))
}

fn select_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let available: Vec<&str> = df.get_column_names().into_iter().map(|c| c.as_str()).collect();
    if let Some(missing) = columns.iter().find(|c| !available.contains(&c.as_str())) {
        return Err(AutoRegError::FeatureNotFound(missing.clone()));
    }
    Ok(df.select(columns.iter().map(|c| c.as_str()))?)
}

/// Write a dataframe as CSV
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

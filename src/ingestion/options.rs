//! Reader options recognized by the ingestion stage

use super::FileType;
use crate::error::{AutoRegError, Result};
use crate::params::{get_bool, get_str, get_usize, Params};
use tracing::warn;

/// Default number of rows polars samples to infer a CSV schema
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 100;

/// Options applied when reading a dataset.
///
/// Built from the loose [`Params`] map handed to [`super::DataIngestion`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionOptions {
    /// Field separator (CSV/TSV only)
    pub separator: u8,
    /// Whether the first row is a header (CSV/TSV only)
    pub has_header: bool,
    /// Rows skipped before the header (CSV/TSV only)
    pub skip_rows: usize,
    /// Rows sampled for schema inference, `None` scans everything
    pub infer_schema_length: Option<usize>,
    /// Keep only the first n rows
    pub n_rows: Option<usize>,
    /// Subset of columns to keep, in this order
    pub columns: Option<Vec<String>>,
}

impl IngestionOptions {
    /// Defaults for a given file type
    pub fn for_file_type(file_type: FileType) -> Self {
        Self {
            separator: if file_type == FileType::Tsv { b'\t' } else { b',' },
            has_header: true,
            skip_rows: 0,
            infer_schema_length: Some(DEFAULT_INFER_SCHEMA_LENGTH),
            n_rows: None,
            columns: None,
        }
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_n_rows(mut self, n_rows: usize) -> Self {
        self.n_rows = Some(n_rows);
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Validate and apply `params` on top of the defaults for `file_type`.
    ///
    /// Unknown keys are rejected. CSV-only keys given for other formats are
    /// ignored with a warning.
    pub fn from_params(params: &Params, file_type: FileType) -> Result<Self> {
        let mut opts = Self::for_file_type(file_type);

        for key in params.keys() {
            let canonical = canonical_key(key).ok_or_else(|| {
                AutoRegError::invalid_parameter(
                    key.as_str(),
                    &params[key],
                    "unrecognized ingestion option",
                )
            })?;

            if is_delimited_only(canonical) && !file_type.is_delimited() {
                warn!(option = %key, file_type = %file_type, "Ignoring CSV-only option");
                continue;
            }

            match canonical {
                "sep" => {
                    let raw = get_str(params, key)?.unwrap_or_default();
                    opts.separator = parse_separator(key, raw)?;
                }
                "has_header" => {
                    if let Some(b) = get_bool(params, key)? {
                        opts.has_header = b;
                    }
                }
                "skip_rows" => {
                    if let Some(n) = get_usize(params, key)? {
                        opts.skip_rows = n;
                    }
                }
                "infer_schema_length" => {
                    if let Some(n) = get_usize(params, key)? {
                        opts.infer_schema_length = if n == 0 { None } else { Some(n) };
                    }
                }
                "n_rows" => {
                    if let Some(n) = get_usize(params, key)? {
                        if n == 0 {
                            return Err(AutoRegError::invalid_parameter(
                                key.as_str(),
                                n,
                                "must be at least 1",
                            ));
                        }
                        opts.n_rows = Some(n);
                    }
                }
                "columns" => {
                    let raw = get_str(params, key)?.unwrap_or_default();
                    let cols: Vec<String> = raw
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect();
                    if cols.is_empty() {
                        return Err(AutoRegError::invalid_parameter(
                            key.as_str(),
                            raw,
                            "no column names given",
                        ));
                    }
                    opts.columns = Some(cols);
                }
                _ => {}
            }
        }

        Ok(opts)
    }
}

fn canonical_key(key: &str) -> Option<&'static str> {
    match key {
        "sep" | "delimiter" => Some("sep"),
        "has_header" | "header" => Some("has_header"),
        "skip_rows" => Some("skip_rows"),
        "infer_schema_length" => Some("infer_schema_length"),
        "n_rows" | "nrows" => Some("n_rows"),
        "columns" | "usecols" => Some("columns"),
        _ => None,
    }
}

fn is_delimited_only(canonical: &str) -> bool {
    matches!(
        canonical,
        "sep" | "has_header" | "skip_rows" | "infer_schema_length"
    )
}

fn parse_separator(key: &str, raw: &str) -> Result<u8> {
    if raw == "\\t" {
        return Ok(b'\t');
    }
    match raw.as_bytes() {
        [b] => Ok(*b),
        _ => Err(AutoRegError::invalid_parameter(
            key,
            raw,
            "separator must be a single ASCII character",
        )),
    }
}

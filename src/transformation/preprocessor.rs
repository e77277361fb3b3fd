//! Fitted feature preprocessing: impute, one-hot encode, scale

use super::encoder::OneHotEncoder;
use super::imputer::{most_frequent_category, ImputeStrategy};
use super::scaler::{ScalerParams, ScalerType};
use crate::error::{AutoRegError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a source column is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

impl FeatureKind {
    /// Numeric and boolean dtypes are numeric, strings are categorical,
    /// anything else is unsupported.
    pub fn of(dtype: &DataType) -> Option<Self> {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Boolean => Some(FeatureKind::Numeric),
            DataType::String => Some(FeatureKind::Categorical),
            _ => None,
        }
    }
}

/// Values of a single source column pulled out of a dataframe
#[derive(Debug, Clone, PartialEq)]
pub enum RawFeature {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl RawFeature {
    pub fn read(df: &DataFrame, name: &str, kind: FeatureKind) -> Result<Self> {
        let column = df
            .column(name)
            .map_err(|_| AutoRegError::FeatureNotFound(name.to_string()))?;
        let series = column.as_materialized_series();

        match kind {
            FeatureKind::Numeric => {
                let cast = series.cast(&DataType::Float64)?;
                let values = cast
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect();
                Ok(RawFeature::Numeric(values))
            }
            FeatureKind::Categorical => {
                let cast = series.cast(&DataType::String)?;
                let values = cast
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect();
                Ok(RawFeature::Categorical(values))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawFeature::Numeric(v) => v.len(),
            RawFeature::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the given row indices, in order
    pub fn take(&self, rows: &[usize]) -> Self {
        match self {
            RawFeature::Numeric(v) => RawFeature::Numeric(rows.iter().map(|&i| v[i]).collect()),
            RawFeature::Categorical(v) => {
                RawFeature::Categorical(rows.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// Settings needed to fit a [`FittedPreprocessor`]
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessorSettings {
    pub numeric_imputation: ImputeStrategy,
    pub scaler: ScalerType,
    pub max_onehot_categories: usize,
}

/// One fitted step per retained source column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureStep {
    Numeric {
        column: String,
        fill_value: f64,
        scaler: ScalerParams,
    },
    Categorical {
        encoder: OneHotEncoder,
    },
}

impl FeatureStep {
    pub fn column(&self) -> &str {
        match self {
            FeatureStep::Numeric { column, .. } => column,
            FeatureStep::Categorical { encoder } => encoder.column(),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureStep::Numeric { .. } => FeatureKind::Numeric,
            FeatureStep::Categorical { .. } => FeatureKind::Categorical,
        }
    }

    fn width(&self) -> usize {
        match self {
            FeatureStep::Numeric { .. } => 1,
            FeatureStep::Categorical { encoder } => encoder.n_outputs(),
        }
    }

    fn write_column(&self, raw: &RawFeature, out: &mut Array2<f64>, offset: usize) -> Result<()> {
        match (self, raw) {
            (FeatureStep::Numeric { fill_value, scaler, .. }, RawFeature::Numeric(values)) => {
                for (row, v) in values.iter().enumerate() {
                    out[[row, offset]] = scaler.apply(v.unwrap_or(*fill_value));
                }
            }
            (FeatureStep::Categorical { encoder }, RawFeature::Categorical(values)) => {
                let width = encoder.n_outputs();
                let mut buf = vec![0.0; width];
                for (row, v) in values.iter().enumerate() {
                    encoder.encode_into(v.as_deref(), &mut buf);
                    for (j, &x) in buf.iter().enumerate() {
                        out[[row, offset + j]] = x;
                    }
                }
            }
            _ => {
                return Err(AutoRegError::PreprocessingError(format!(
                    "column '{}' does not match its fitted kind",
                    self.column()
                )))
            }
        }
        Ok(())
    }
}

/// Preprocessing fitted on the training split and reusable on new data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    steps: Vec<FeatureStep>,
    feature_names: Vec<String>,
}

impl FittedPreprocessor {
    /// Fit every step on training values only.
    ///
    /// `columns` must already be restricted to training rows. Categorical
    /// columns with too many categories are dropped.
    pub fn fit(columns: &[(String, RawFeature)], settings: &PreprocessorSettings) -> Result<Self> {
        let mut steps = Vec::with_capacity(columns.len());

        for (name, raw) in columns {
            match raw {
                RawFeature::Numeric(values) => {
                    let fill_value = settings.numeric_imputation.fill_value(values);
                    let imputed: Vec<f64> = values.iter().map(|v| v.unwrap_or(fill_value)).collect();
                    let scaler = ScalerParams::fit(settings.scaler, &imputed);
                    steps.push(FeatureStep::Numeric {
                        column: name.clone(),
                        fill_value,
                        scaler,
                    });
                }
                RawFeature::Categorical(values) => {
                    let fill = most_frequent_category(values);
                    let encoder = OneHotEncoder::fit(name.clone(), values, fill);
                    if encoder.n_outputs() > settings.max_onehot_categories {
                        warn!(
                            column = %name,
                            categories = encoder.n_outputs(),
                            max = settings.max_onehot_categories,
                            "Dropping high-cardinality categorical column"
                        );
                        continue;
                    }
                    if encoder.n_outputs() == 0 {
                        warn!(column = %name, "Dropping categorical column with no values");
                        continue;
                    }
                    steps.push(FeatureStep::Categorical { encoder });
                }
            }
        }

        if steps.is_empty() {
            return Err(AutoRegError::DataError(
                "no usable feature columns after preprocessing".to_string(),
            ));
        }

        Ok(Self::from_steps(steps))
    }

    /// Identity preprocessing over already numeric features
    pub fn passthrough(feature_names: &[String]) -> Self {
        let steps = feature_names
            .iter()
            .map(|name| FeatureStep::Numeric {
                column: name.clone(),
                fill_value: 0.0,
                scaler: ScalerParams::IDENTITY,
            })
            .collect();
        Self::from_steps(steps)
    }

    fn from_steps(steps: Vec<FeatureStep>) -> Self {
        let feature_names = steps
            .iter()
            .flat_map(|s| match s {
                FeatureStep::Numeric { column, .. } => vec![column.clone()],
                FeatureStep::Categorical { encoder } => encoder.feature_names(),
            })
            .collect();
        Self { steps, feature_names }
    }

    pub fn steps(&self) -> &[FeatureStep] {
        &self.steps
    }

    /// Output feature names, one per matrix column
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Source columns required by [`Self::transform`]
    pub fn input_columns(&self) -> Vec<&str> {
        self.steps.iter().map(FeatureStep::column).collect()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Apply the fitted steps to raw columns, looked up by name
    pub fn transform_raw(&self, columns: &[(String, RawFeature)]) -> Result<Array2<f64>> {
        let n_rows = columns.first().map(|(_, raw)| raw.len()).unwrap_or(0);
        let mut out = Array2::zeros((n_rows, self.n_features()));

        let mut offset = 0;
        for step in &self.steps {
            let (_, raw) = columns
                .iter()
                .find(|(name, _)| name == step.column())
                .ok_or_else(|| AutoRegError::FeatureNotFound(step.column().to_string()))?;
            if raw.len() != n_rows {
                return Err(AutoRegError::ShapeError {
                    expected: format!("{n_rows} rows"),
                    actual: format!("{} rows in '{}'", raw.len(), step.column()),
                });
            }
            step.write_column(raw, &mut out, offset)?;
            offset += step.width();
        }

        Ok(out)
    }

    /// Apply the fitted steps to a new dataframe
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let columns = self
            .steps
            .iter()
            .map(|step| {
                RawFeature::read(df, step.column(), step.kind())
                    .map(|raw| (step.column().to_string(), raw))
            })
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Ok(Array2::zeros((df.height(), 0)));
        }
        self.transform_raw(&columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PreprocessorSettings {
        PreprocessorSettings {
            numeric_imputation: ImputeStrategy::Median,
            scaler: ScalerType::None,
            max_onehot_categories: 3,
        }
    }

    fn cat(values: &[Option<&str>]) -> RawFeature {
        RawFeature::Categorical(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn test_fit_and_transform_raw() {
        let columns = vec![
            ("x".to_string(), RawFeature::Numeric(vec![Some(1.0), None, Some(3.0)])),
            ("c".to_string(), cat(&[Some("b"), Some("a"), Some("b")])),
        ];
        let pre = FittedPreprocessor::fit(&columns, &settings()).unwrap();

        assert_eq!(pre.feature_names(), &["x", "c_a", "c_b"]);

        let out = pre.transform_raw(&columns).unwrap();
        assert_eq!(out.shape(), &[3, 3]);
        // median of {1, 3} fills the gap
        assert_eq!(out[[1, 0]], 2.0);
        assert_eq!(out.row(1).to_vec(), vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_high_cardinality_dropped() {
        let columns = vec![
            ("x".to_string(), RawFeature::Numeric(vec![Some(1.0); 4])),
            ("id".to_string(), cat(&[Some("a"), Some("b"), Some("c"), Some("d")])),
        ];
        let pre = FittedPreprocessor::fit(&columns, &settings()).unwrap();
        assert_eq!(pre.input_columns(), vec!["x"]);
    }

    #[test]
    fn test_no_usable_columns() {
        let columns = vec![("id".to_string(), cat(&[Some("a"), Some("b"), Some("c"), Some("d")]))];
        let err = FittedPreprocessor::fit(&columns, &settings()).unwrap_err();
        assert!(matches!(err, AutoRegError::DataError(_)));
    }

    #[test]
    fn test_transform_dataframe() {
        let train = df!(
            "x" => &[1.0, 2.0, 3.0],
            "c" => &["a", "b", "a"]
        )
        .unwrap();
        let columns = vec![
            ("x".to_string(), RawFeature::read(&train, "x", FeatureKind::Numeric).unwrap()),
            ("c".to_string(), RawFeature::read(&train, "c", FeatureKind::Categorical).unwrap()),
        ];
        let pre = FittedPreprocessor::fit(&columns, &settings()).unwrap();

        let new = df!(
            "c" => &["b", "zzz"],
            "x" => &[10.0, 20.0]
        )
        .unwrap();
        let out = pre.transform(&new).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![10.0, 0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![20.0, 0.0, 0.0]);

        let missing = df!("x" => &[1.0]).unwrap();
        assert!(matches!(
            pre.transform(&missing),
            Err(AutoRegError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_infinite_values_imputed_like_nulls() {
        let train = df!("x" => &[1.0, f64::INFINITY, 3.0, f64::NEG_INFINITY, f64::NAN]).unwrap();
        let raw = RawFeature::read(&train, "x", FeatureKind::Numeric).unwrap();
        assert_eq!(raw, RawFeature::Numeric(vec![Some(1.0), None, Some(3.0), None, None]));

        let standard = PreprocessorSettings {
            scaler: ScalerType::Standard,
            ..settings()
        };
        let pre = FittedPreprocessor::fit(&[("x".to_string(), raw)], &standard).unwrap();
        let out = pre.transform(&train).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
        // missing cells take the median, which standardizes to zero
        assert_eq!(out[[1, 0]], 0.0);
    }

    #[test]
    fn test_passthrough() {
        let names = vec!["a".to_string(), "b".to_string()];
        let pre = FittedPreprocessor::passthrough(&names);
        let df = df!("a" => &[1.5], "b" => &[-2.0]).unwrap();
        let out = pre.transform(&df).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_serde_roundtrip_preserves_steps() {
        let columns = vec![("c".to_string(), cat(&[Some("a"), None]))];
        let pre = FittedPreprocessor::fit(&columns, &settings()).unwrap();
        let json = serde_json::to_string(&pre).unwrap();
        let back: FittedPreprocessor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pre);
    }
}

//! Missing value imputation

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for imputing missing numeric values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with the training mean
    Mean,
    /// Replace with the training median
    #[default]
    Median,
    /// Replace with the most frequent training value
    MostFrequent,
    /// Replace with a constant value
    Constant(f64),
}

impl ImputeStrategy {
    /// Compute the fill value from observed training values.
    ///
    /// Returns 0.0 when nothing was observed.
    pub fn fill_value(&self, values: &[Option<f64>]) -> f64 {
        let ca: Float64Chunked = values
            .iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        match self {
            ImputeStrategy::Mean => ca.mean().unwrap_or(0.0),
            ImputeStrategy::Median => ca.median().unwrap_or(0.0),
            ImputeStrategy::MostFrequent => numeric_mode(&ca).unwrap_or(0.0),
            ImputeStrategy::Constant(v) => *v,
        }
    }
}

/// Most frequent value, smallest first on ties
fn numeric_mode(ca: &Float64Chunked) -> Option<f64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for val in ca.into_iter().flatten() {
        // fold -0.0 into 0.0
        let val = if val == 0.0 { 0.0 } else { val };
        *counts.entry(val.to_bits()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(bits, count)| (f64::from_bits(bits), count))
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.total_cmp(a)))
        .map(|(v, _)| v)
}

/// Most frequent category, lexicographically smallest on ties
pub fn most_frequent_category(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(v, _)| v.to_string())
}

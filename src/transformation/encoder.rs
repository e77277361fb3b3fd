//! One-hot encoding of categorical columns

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A one-hot encoder fitted on a single categorical column.
///
/// Categories are kept sorted so output column order is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    column: String,
    categories: Vec<String>,
    fill_value: Option<String>,
}

impl OneHotEncoder {
    /// Fit on training values. Missing entries are replaced by `fill_value`
    /// (the most frequent category) before the category set is collected.
    pub fn fit(column: impl Into<String>, values: &[Option<String>], fill_value: Option<String>) -> Self {
        let mut categories: BTreeSet<String> = values.iter().flatten().cloned().collect();
        if values.iter().any(Option::is_none) {
            if let Some(fill) = &fill_value {
                categories.insert(fill.clone());
            }
        }

        Self {
            column: column.into(),
            categories: categories.into_iter().collect(),
            fill_value,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn n_outputs(&self) -> usize {
        self.categories.len()
    }

    /// Output column names, `{column}_{category}`
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.column, c))
            .collect()
    }

    /// Index of the hot column for a value; unknown categories give `None`
    pub fn index_of(&self, value: Option<&str>) -> Option<usize> {
        let value = value.or(self.fill_value.as_deref())?;
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Write the one-hot encoding of `value` into `out` (length `n_outputs`)
    pub fn encode_into(&self, value: Option<&str>, out: &mut [f64]) {
        out.iter_mut().for_each(|v| *v = 0.0);
        if let Some(idx) = self.index_of(value) {
            out[idx] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(raw: &[Option<&str>]) -> Vec<Option<String>> {
        raw.iter().map(|v| v.map(str::to_string)).collect()
    }

    #[test]
    fn test_onehot_sorted_categories() {
        let enc = OneHotEncoder::fit("color", &values(&[Some("red"), Some("blue"), Some("red")]), None);
        assert_eq!(enc.categories(), &["blue".to_string(), "red".to_string()]);
        assert_eq!(enc.feature_names(), vec!["color_blue", "color_red"]);
    }

    #[test]
    fn test_encode_known_unknown_missing() {
        let enc = OneHotEncoder::fit(
            "c",
            &values(&[Some("a"), Some("b"), None]),
            Some("b".to_string()),
        );
        let mut out = vec![0.0; enc.n_outputs()];

        enc.encode_into(Some("a"), &mut out);
        assert_eq!(out, vec![1.0, 0.0]);

        enc.encode_into(None, &mut out);
        assert_eq!(out, vec![0.0, 1.0]);

        enc.encode_into(Some("zzz"), &mut out);
        assert_eq!(out, vec![0.0, 0.0]);
    }
}

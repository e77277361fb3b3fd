//! CART regression tree

use crate::error::{AutoRegError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    fn predict_row(&self, x: &Array2<f64>, row: usize) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if x[[row, *feature_idx]] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// All features
    #[default]
    All,
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
        };
        k.clamp(1, n_features.max(1))
    }

    /// Parse `sqrt`, `log2`, `all`/`none`, an integer count or a fraction in (0, 1]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" | "none" | "auto" => Some(MaxFeatures::All),
            "sqrt" => Some(MaxFeatures::Sqrt),
            "log2" => Some(MaxFeatures::Log2),
            other => {
                if let Ok(n) = other.parse::<usize>() {
                    Some(MaxFeatures::Fixed(n))
                } else {
                    other
                        .parse::<f64>()
                        .ok()
                        .filter(|f| *f > 0.0 && *f <= 1.0)
                        .map(MaxFeatures::Fraction)
                }
            }
        }
    }
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Reduction in the sum of squared errors
    gain: f64,
}

/// Regression tree minimizing squared error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Seed for feature subsampling
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AutoRegError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AutoRegError::TrainingError("cannot fit a tree on zero rows".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(AutoRegError::invalid_parameter(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf < 1 {
            return Err(AutoRegError::invalid_parameter(
                "min_samples_leaf",
                self.min_samples_leaf,
                "must be at least 1",
            ));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        let k = self.max_features.resolve(n_features);

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_node(x, y, indices, 0, k, &mut rng, &mut importances);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_node(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        k: usize,
        rng: &mut Xoshiro256PlusPlus,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let value = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples.max(1) as f64;
        let leaf = TreeNode::Leaf { value, n_samples };

        let pure = indices.iter().all(|&i| (y[i] - y[indices[0]]).abs() < 1e-12);
        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || pure
        {
            return leaf;
        }

        let features: Vec<usize> = if k >= self.n_features {
            (0..self.n_features).collect()
        } else {
            let mut picked = rand::seq::index::sample(rng, self.n_features, k).into_vec();
            picked.sort_unstable();
            picked
        };

        let Some(split) = self.find_best_split(x, y, &indices, &features) else {
            return leaf;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, split.feature_idx]] <= split.threshold);
        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return leaf;
        }

        importances[split.feature_idx] += split.gain;

        let left = self.build_node(x, y, left_idx, depth + 1, k, rng, importances);
        let right = self.build_node(x, y, right_idx, depth + 1, k, rng, importances);

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
            n_samples,
        }
    }

    /// Scan every candidate feature in parallel. Each scan sorts the node's
    /// rows by that feature once and sweeps prefix sums.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let parent_score = total_sum * total_sum / n as f64;
        let min_leaf = self.min_samples_leaf;

        features
            .par_iter()
            .filter_map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;

                for pos in 1..n {
                    left_sum += pairs[pos - 1].1;
                    if pos < min_leaf || n - pos < min_leaf {
                        continue;
                    }
                    let (lo, hi) = (pairs[pos - 1].0, pairs[pos].0);
                    if lo >= hi {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let score = left_sum * left_sum / pos as f64
                        + right_sum * right_sum / (n - pos) as f64;
                    let gain = score - parent_score;

                    if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                        // adjacent floats or infinite bounds can push the midpoint onto `hi`
                        let mid = lo + (hi - lo) / 2.0;
                        let threshold = if mid.is_finite() && mid < hi { mid } else { lo };
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold,
                            gain,
                        });
                    }
                }
                best
            })
            // ties go to the lower feature index
            .reduce_with(|a, b| {
                if b.gain > a.gain || (b.gain == a.gain && b.feature_idx < a.feature_idx) {
                    b
                } else {
                    a
                }
            })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(AutoRegError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(AutoRegError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((0..x.nrows()).map(|i| root.predict_row(x, i)).collect())
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        // grown to purity, the tree reproduces the training targets
        let predictions = tree.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
    }

    #[test]
    fn test_step_function() {
        let x = array![[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, -5.0, -5.0, -5.0];

        let mut tree = DecisionTreeRegressor::new().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
        let pred = tree.predict(&array![[1.5], [9.0]]).unwrap();
        assert_eq!(pred, array![5.0, -5.0]);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 0.0, 10.0];

        let mut tree = DecisionTreeRegressor::new().with_min_samples_leaf(2);
        tree.fit(&x, &y).unwrap();
        let pred = tree.predict(&array![[4.0]]).unwrap();
        assert_eq!(pred[0], 5.0);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 4);
        assert_eq!(MaxFeatures::Fixed(50).resolve(10), 10);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
        assert_eq!(MaxFeatures::parse("sqrt"), Some(MaxFeatures::Sqrt));
        assert_eq!(MaxFeatures::parse("0.5"), Some(MaxFeatures::Fraction(0.5)));
        assert_eq!(MaxFeatures::parse("3"), Some(MaxFeatures::Fixed(3)));
        assert_eq!(MaxFeatures::parse("lots"), None);
    }

    #[test]
    fn test_adjacent_floats_split_cleanly() {
        let lo = f64::from_bits(1.0f64.to_bits() + 1);
        let hi = f64::from_bits(1.0f64.to_bits() + 2);
        let x = array![[lo], [hi]];
        let y = array![0.0, 1.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.get_n_leaves(), 2);
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_non_finite_feature_values() {
        let x = array![[1.0], [2.0], [f64::INFINITY], [f64::INFINITY], [f64::NAN], [f64::NEG_INFINITY]];
        let y = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert!(pred.iter().all(|p| p.is_finite()));
        assert_eq!(pred[0], 0.0);
        assert_eq!(pred[5], 5.0);
        // identical infinite values cannot be separated
        assert_eq!(pred[2], 2.5);
        assert_eq!(pred[3], 2.5);
    }

    #[test]
    fn test_predict_errors() {
        let tree = DecisionTreeRegressor::new();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(AutoRegError::ModelNotFitted)
        ));

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap();
        assert!(tree.predict(&array![[1.0, 2.0]]).is_err());
    }
}

//! K-nearest neighbours regressor

use crate::error::{AutoRegError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl DistanceMetric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Some(DistanceMetric::Euclidean),
            "manhattan" | "l1" | "cityblock" => Some(DistanceMetric::Manhattan),
            _ => None,
        }
    }

    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let diffs = a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs());
        match *self {
            DistanceMetric::Euclidean => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            DistanceMetric::Manhattan => diffs.sum(),
            DistanceMetric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
        }
    }
}

/// Weighting scheme for neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbours have equal weight
    #[default]
    Uniform,
    /// Inverse-distance weighting
    Distance,
}

impl WeightScheme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "uniform" => Some(WeightScheme::Uniform),
            "distance" => Some(WeightScheme::Distance),
            _ => None,
        }
    }
}

/// KNN configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNNConfig {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-nearest neighbours regressor; fitting stores the training set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Default config with `k` neighbours
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(AutoRegError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.config.n_neighbors == 0 {
            return Err(AutoRegError::invalid_parameter("n_neighbors", 0, "must be at least 1"));
        }
        if x.nrows() == 0 {
            return Err(AutoRegError::TrainingError("cannot fit KNN on zero rows".to_string()));
        }
        if let DistanceMetric::Minkowski(p) = self.config.metric {
            if !(p >= 1.0) {
                return Err(AutoRegError::invalid_parameter("p", p, "must be >= 1"));
            }
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(self)
    }

    /// Predict each row from its neighbours, in parallel over rows.
    ///
    /// `k` is capped at the number of stored training rows.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => return Err(AutoRegError::ModelNotFitted),
        };
        if x.ncols() != x_train.ncols() {
            return Err(AutoRegError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let k = self.config.n_neighbors.min(x_train.nrows());
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbours = k_nearest(x.row(i), x_train, y_train, k, self.config.metric);
                weighted_mean(&neighbours, self.config.weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }
}

/// Max-heap entry keyed by distance, then training row for stable ties
#[derive(Debug, Clone, Copy)]
struct Neighbour {
    dist: f64,
    row: usize,
    target: f64,
}

impl PartialEq for Neighbour {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbour {}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist).then(self.row.cmp(&other.row))
    }
}

/// The k closest training rows, found with a bounded max-heap
fn k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<Neighbour> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (row, train_row) in x_train.rows().into_iter().enumerate() {
        let candidate = Neighbour {
            dist: metric.distance(point, train_row),
            row,
            target: y_train[row],
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|top| candidate < *top) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_vec()
}

fn mean_target<'a>(neighbours: impl Iterator<Item = &'a Neighbour>) -> f64 {
    let (sum, count) = neighbours.fold((0.0, 0usize), |(s, c), n| (s + n.target, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn weighted_mean(neighbours: &[Neighbour], weights: WeightScheme) -> f64 {
    match weights {
        WeightScheme::Uniform => mean_target(neighbours.iter()),
        WeightScheme::Distance => {
            // exact matches dominate inverse-distance weighting
            if neighbours.iter().any(|n| n.dist == 0.0) {
                return mean_target(neighbours.iter().filter(|n| n.dist == 0.0));
            }
            let (num, den) = neighbours.iter().fold((0.0, 0.0), |(num, den), n| {
                let w = 1.0 / n.dist;
                (num + w * n.target, den + w)
            });
            if den > 0.0 {
                num / den
            } else {
                mean_target(neighbours.iter())
            }
        }
    }
}

//! Train/test splitting

use crate::error::{AutoRegError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of test rows: `ceil(n * test_size)` clamped to `[1, n - 1]`
pub fn test_count(n_samples: usize, test_size: f64) -> usize {
    // tolerate float noise such as 0.1 * 30 = 3.0000000000000004
    let raw = (n_samples as f64 * test_size - 1e-9).ceil().max(0.0) as usize;
    raw.clamp(1, n_samples.saturating_sub(1).max(1))
}

/// Split `0..n_samples` into train and test indices.
///
/// Shuffled rows are drawn with a seeded ChaCha8 generator; without
/// shuffling the last rows form the test set.
pub fn train_test_split(
    n_samples: usize,
    test_size: f64,
    shuffle: bool,
    random_state: u64,
) -> Result<SplitIndices> {
    if n_samples < 2 {
        return Err(AutoRegError::DataError(format!(
            "need at least 2 rows to split into train and test, got {n_samples}"
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AutoRegError::invalid_parameter(
            "test_size",
            test_size,
            "must be strictly between 0 and 1",
        ));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    if shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(random_state);
        indices.shuffle(&mut rng);
    }

    let n_test = test_count(n_samples, test_size);
    let split_point = n_samples - n_test;

    Ok(SplitIndices {
        train: indices[..split_point].to_vec(),
        test: indices[split_point..].to_vec(),
    })
}

//! Stratified train/test partitioning

use crate::error::{Result, TrainerError};
use crate::preprocessing::LabelVector;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One side of a split
#[derive(Debug, Clone)]
pub struct Partition {
    pub x: Array2<f64>,
    pub y: LabelVector,
    /// Row positions in the selected dataset
    pub indices: Vec<usize>,
}

impl Partition {
    fn take(x: &Array2<f64>, y: &LabelVector, indices: Vec<usize>) -> Self {
        let n_cols = x.ncols();
        let part_x = Array2::from_shape_fn((indices.len(), n_cols), |(i, j)| x[[indices[i], j]]);
        Self {
            x: part_x,
            y: y.select(&indices),
            indices,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Disjoint train and test partitions
#[derive(Debug, Clone)]
pub struct SplitResult {
    pub train: Partition,
    pub test: Partition,
}

/// Stratified splitter with a fixed seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedSplitter {
    test_fraction: f64,
    seed: u64,
}

impl Default for StratifiedSplitter {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl StratifiedSplitter {
    pub fn new(test_fraction: f64, seed: u64) -> Result<Self> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(TrainerError::Configuration(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }
        Ok(Self {
            test_fraction,
            seed,
        })
    }

    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Smallest class size that can still be stratified
    pub fn min_class_count(&self) -> usize {
        (1.0 / self.test_fraction).ceil() as usize
    }

    /// Test rows per class. The total is `ceil(n * test_fraction)`, shared out
    /// in proportion to class size with leftover rows going to the largest
    /// remainders (class 0 wins ties). Every class keeps at least one row on
    /// each side.
    fn per_class_test_rows(&self, counts: [usize; 2]) -> [usize; 2] {
        let n = counts[0] + counts[1];
        let total = ((n as f64 * self.test_fraction).ceil() as usize).clamp(2, n - 2);

        let mut quotas = counts.map(|c| total * c / n);
        let remainders = counts.map(|c| total * c % n);
        // two classes leave at most one row over
        let leftover = total - quotas[0] - quotas[1];
        let class = usize::from(remainders[1] > remainders[0]);
        quotas[class] += leftover;

        for (quota, &count) in quotas.iter_mut().zip(counts.iter()) {
            *quota = (*quota).clamp(1, count - 1);
        }
        quotas
    }

    /// Partition rows so that both classes keep their share in train and test
    pub fn split(&self, x: &Array2<f64>, y: &LabelVector) -> Result<SplitResult> {
        if x.nrows() != y.len() {
            return Err(TrainerError::dimension_mismatch(
                "feature rows vs labels",
                x.nrows(),
                y.len(),
            ));
        }

        // class 0 first, then class 1, so the draw order is fixed
        let mut class_indices: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (i, &label) in y.values().iter().enumerate() {
            class_indices[label as usize].push(i);
        }

        let min_count = self.min_class_count();
        for (class, indices) in class_indices.iter().enumerate() {
            if indices.len() < min_count {
                return Err(TrainerError::InsufficientData(format!(
                    "class {} has {} examples; at least {} are needed to stratify a {:.0}% test split",
                    class,
                    indices.len(),
                    min_count,
                    self.test_fraction * 100.0
                )));
            }
        }

        let counts = [class_indices[0].len(), class_indices[1].len()];
        let quotas = self.per_class_test_rows(counts);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let mut train_indices = Vec::with_capacity(y.len());
        let mut test_indices = Vec::new();

        for (indices, n_test) in class_indices.iter_mut().zip(quotas) {
            indices.shuffle(&mut rng);
            test_indices.extend_from_slice(&indices[..n_test]);
            train_indices.extend_from_slice(&indices[n_test..]);
        }

        train_indices.shuffle(&mut rng);
        test_indices.shuffle(&mut rng);

        debug!(
            train = train_indices.len(),
            test = test_indices.len(),
            seed = self.seed,
            "Stratified split"
        );

        Ok(SplitResult {
            train: Partition::take(x, y, train_indices),
            test: Partition::take(x, y, test_indices),
        })
    }
}

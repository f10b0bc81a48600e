//! Soft-voting ensemble over two probability vectors

use crate::error::{Result, TrainerError};
use crate::training::ProbabilityVector;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Weight given to each of the two models
const MODEL_WEIGHT: f64 = 0.5;

/// Equal-weight average of two models' positive-class probabilities
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Ensembler;

impl Ensembler {
    /// `0.5 * a[i] + 0.5 * b[i]` for every row
    pub fn combine(&self, a: &ProbabilityVector, b: &ProbabilityVector) -> Result<ProbabilityVector> {
        if a.len() != b.len() {
            return Err(TrainerError::dimension_mismatch(
                "ensemble inputs",
                a.len(),
                b.len(),
            ));
        }

        let blended = Zip::from(a.values())
            .and(b.values())
            .map_collect(|&pa, &pb| (MODEL_WEIGHT * pa + MODEL_WEIGHT * pb).clamp(0.0, 1.0));
        ProbabilityVector::new(blended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_weight_average() {
        let a = ProbabilityVector::from(vec![0.2, 0.9]);
        let b = ProbabilityVector::from(vec![0.4, 0.5]);
        let blended = Ensembler::default().combine(&a, &b).unwrap();
        assert!((blended.values()[0] - 0.3).abs() < 1e-12);
        assert!((blended.values()[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_default_combination_is_symmetric() {
        let a = ProbabilityVector::from(vec![0.1, 0.35, 0.8, 1.0]);
        let b = ProbabilityVector::from(vec![0.6, 0.05, 0.8, 0.0]);
        let ens = Ensembler::default();
        assert_eq!(ens.combine(&a, &b).unwrap(), ens.combine(&b, &a).unwrap());
    }

    #[test]
    fn test_length_mismatch() {
        let a = ProbabilityVector::from(vec![0.1, 0.2]);
        let b = ProbabilityVector::from(vec![0.1]);
        let err = Ensembler::default().combine(&a, &b).unwrap_err();
        assert!(matches!(err, TrainerError::DimensionMismatch { left: 2, right: 1, .. }));
    }

    #[test]
    fn test_empty_inputs() {
        let a = ProbabilityVector::from(Vec::new());
        let blended = Ensembler::default().combine(&a, &a).unwrap();
        assert!(blended.is_empty());
    }
}

//! Raw logits to probabilities and a predicted class

use candle_core::{DType, Device, Tensor, D};
use geosight_core::{ClassLabel, Error, Result, ScoreVector};

/// Top class of a normalized score vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Winning class
    pub label: ClassLabel,

    /// Probability of the winning class
    pub confidence: f32,

    /// Full probability distribution, in class order
    pub probabilities: ScoreVector,
}

/// Softmax plus stable argmax
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreNormalizer;

impl ScoreNormalizer {
    /// Normalize raw scores and pick the winning class
    pub fn normalize(raw: &ScoreVector) -> Result<Prediction> {
        let probabilities = Self::softmax(raw)?;
        let label = Self::argmax(raw);

        Ok(Prediction {
            label,
            confidence: probabilities.get(label),
            probabilities,
        })
    }

    /// Numerically stable softmax (the maximum is subtracted before exponentiating)
    pub fn softmax(raw: &ScoreVector) -> Result<ScoreVector> {
        if let Some((label, value)) = raw.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::inference(format!(
                "non-finite score {} for class {}",
                value, label
            )));
        }

        // Computed in f64 so the f32 outputs sum to 1 within rounding of the cast
        let probabilities = Tensor::new(raw.as_slice(), &Device::Cpu)
            .and_then(|logits| logits.to_dtype(DType::F64))
            .and_then(|logits| candle_nn::ops::softmax(&logits, D::Minus1))
            .and_then(|probs| probs.to_dtype(DType::F32))
            .and_then(|probs| probs.to_vec1::<f32>())
            .map_err(|e| Error::internal(format!("softmax failed: {}", e)))?;

        ScoreVector::from_slice(&probabilities)
    }

    /// Index of the largest score; the first one wins on ties
    pub fn argmax(scores: &ScoreVector) -> ClassLabel {
        let mut best = (ClassLabel::ALL[0], f32::NEG_INFINITY);
        for (label, score) in scores.iter() {
            if score > best.1 {
                best = (label, score);
            }
        }
        best.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scores(values: [f32; 10]) -> ScoreVector {
        ScoreVector::new(values)
    }

    #[test]
    fn test_uniform_logits() {
        let prediction = ScoreNormalizer::normalize(&scores([3.0; 10])).unwrap();

        assert_eq!(prediction.label, ClassLabel::AnnualCrop);
        for (_, p) in prediction.probabilities.iter() {
            assert!((p - 0.1).abs() < 1e-6);
        }
    }

    #[test]
    fn test_clear_winner() {
        let mut values = [0.0; 10];
        values[ClassLabel::SeaLake.index()] = 12.0;

        let prediction = ScoreNormalizer::normalize(&scores(values)).unwrap();
        assert_eq!(prediction.label, ClassLabel::SeaLake);
        assert!(prediction.confidence > 0.99);
        assert_eq!(prediction.confidence, prediction.probabilities.get(ClassLabel::SeaLake));
    }

    #[test]
    fn test_tie_prefers_lower_index() {
        let mut values = [-1.0; 10];
        values[ClassLabel::Pasture.index()] = 5.0;
        values[ClassLabel::Highway.index()] = 5.0;

        assert_eq!(ScoreNormalizer::argmax(&scores(values)), ClassLabel::Highway);

        let prediction = ScoreNormalizer::normalize(&scores(values)).unwrap();
        assert_eq!(prediction.label, ClassLabel::Highway);
    }

    #[test]
    fn test_large_logits_do_not_overflow() {
        let mut values = [1000.0; 10];
        values[ClassLabel::Forest.index()] = 1001.0;

        let prediction = ScoreNormalizer::normalize(&scores(values)).unwrap();
        assert_eq!(prediction.label, ClassLabel::Forest);
        assert!(prediction.probabilities.iter().all(|(_, p)| p.is_finite()));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut values = [0.0; 10];
        values[4] = f32::NAN;
        let err = ScoreNormalizer::normalize(&scores(values)).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));

        values[4] = f32::INFINITY;
        assert!(ScoreNormalizer::softmax(&scores(values)).is_err());
    }

    proptest! {
        #[test]
        fn prop_softmax_is_distribution(values in prop::array::uniform10(-50.0f32..50.0)) {
            let probs = ScoreNormalizer::softmax(&scores(values)).unwrap();
            let sum: f64 = probs.as_slice().iter().map(|&p| f64::from(p)).sum();

            prop_assert!((sum - 1.0).abs() < 1e-6, "sum was {}", sum);
            for p in probs.as_slice() {
                prop_assert!((0.0..=1.0).contains(p));
            }
        }

        #[test]
        fn prop_softmax_shift_invariant(
            values in prop::array::uniform10(-20.0f32..20.0),
            shift in -100.0f32..100.0,
        ) {
            let shifted = values.map(|v| v + shift);

            let a = ScoreNormalizer::softmax(&scores(values)).unwrap();
            let b = ScoreNormalizer::softmax(&scores(shifted)).unwrap();

            for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
                prop_assert!((x - y).abs() < 1e-5, "{} vs {}", x, y);
            }
        }

        #[test]
        fn prop_confidence_is_top_probability(values in prop::array::uniform10(-10.0f32..10.0)) {
            let prediction = ScoreNormalizer::normalize(&scores(values)).unwrap();

            for p in prediction.probabilities.as_slice() {
                prop_assert!(prediction.confidence >= *p);
            }
        }
    }
}

use serde::{Deserialize, Serialize};

/// Binary classification metrics with class 1 as the positive class.
///
/// Precision, recall and F1 are 0.0 when their denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Number of scored rows.
    pub support: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ClassificationMetrics {
    /// Score `y_pred` against `y_true`, pairing them up to the shorter length.
    pub fn compute(y_true: &[u8], y_pred: &[u8]) -> Self {
        let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
        let support = y_true.len().min(y_pred.len());

        for (&truth, &pred) in y_true.iter().zip(y_pred) {
            match (truth == 1, pred == 1) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
            if (truth == 1) == (pred == 1) {
                correct += 1;
            }
        }

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: ratio(correct, support),
            precision,
            recall,
            f1_score,
            support,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [0, 1, 1, 0, 1];
        let m = ClassificationMetrics::compute(&y, &y);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.support, 5);
    }

    #[test]
    fn test_mixed_predictions() {
        // tp = 2, fp = 1, fn = 1, tn = 1
        let truth = [1, 1, 1, 0, 0];
        let pred = [1, 1, 0, 1, 0];
        let m = ClassificationMetrics::compute(&truth, &pred);
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions_scores_zero() {
        let m = ClassificationMetrics::compute(&[1, 0, 1], &[0, 0, 0]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1_score, 0.0);
        assert!((m.accuracy - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input() {
        let m = ClassificationMetrics::compute(&[], &[]);
        assert_eq!(m, ClassificationMetrics::default());
    }
}

//! Binary classification metrics with "member" as the positive class.

use mia_core::{check_same_len, Result};

/// Confusion-matrix counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    /// Members guessed as members.
    pub tp: usize,
    /// Non-members guessed as members.
    pub fp: usize,
    /// Non-members guessed as non-members.
    pub tn: usize,
    /// Members guessed as non-members.
    pub fn_: usize,
}

impl ConfusionCounts {
    /// Tally guesses against ground truth.
    pub fn from_guesses(guesses: &[bool], truth: &[bool]) -> Result<Self> {
        check_same_len("membership guesses", guesses.len(), truth.len())?;
        let mut counts = Self::default();
        for (&g, &t) in guesses.iter().zip(truth) {
            match (g, t) {
                (true, true) => counts.tp += 1,
                (true, false) => counts.fp += 1,
                (false, false) => counts.tn += 1,
                (false, true) => counts.fn_ += 1,
            }
        }
        Ok(counts)
    }

    /// Number of scored samples.
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// Correct guesses.
    pub fn correct(&self) -> usize {
        self.tp + self.tn
    }

    /// True positive rate (recall).
    pub fn tpr(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// False positive rate.
    pub fn fpr(&self) -> f64 {
        ratio(self.fp, self.fp + self.tn)
    }
}

/// `num / den`, or 0 when `den == 0`.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Accuracy, precision, recall and F1 of a membership attack.
///
/// Undefined ratios (0/0) are reported as 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MembershipMetrics {
    /// Fraction of correct guesses.
    pub accuracy: f64,
    /// Fraction of "member" guesses that were members.
    pub precision: f64,
    /// Fraction of members guessed as members.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Underlying counts.
    pub counts: ConfusionCounts,
}

impl MembershipMetrics {
    /// Score guesses against ground truth.
    pub fn compute(guesses: &[bool], truth: &[bool]) -> Result<Self> {
        Ok(Self::from_counts(ConfusionCounts::from_guesses(
            guesses, truth,
        )?))
    }

    /// Metrics from precomputed counts.
    pub fn from_counts(counts: ConfusionCounts) -> Self {
        let accuracy = ratio(counts.correct(), counts.total());
        let precision = ratio(counts.tp, counts.tp + counts.fp);
        let recall = ratio(counts.tp, counts.tp + counts.fn_);
        // 2TP / (2TP + FP + FN) equals the harmonic mean and is 0 when TP is 0.
        let f1 = ratio(2 * counts.tp, 2 * counts.tp + counts.fp + counts.fn_);
        Self {
            accuracy,
            precision,
            recall,
            f1,
            counts,
        }
    }
}

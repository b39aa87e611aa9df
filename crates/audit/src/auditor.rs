//! Membership-inference audit summaries.

use statrs::distribution::{Beta, ContinuousCDF};

use mia_core::{check_same_len, MiaError, Result};

use crate::metrics::MembershipMetrics;

/// Result of scoring one attack.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditSummary {
    /// Accuracy, precision, recall and F1.
    pub metrics: MembershipMetrics,
    /// Empirical epsilon lower bound implied by the attack's TPR/FPR.
    pub epsilon_lower: f64,
    /// Area under the ROC curve of the membership scores, when scores were given.
    pub auroc: Option<f64>,
    /// Clopper-Pearson interval on accuracy at the auditor's confidence.
    pub accuracy_interval: (f64, f64),
}

/// Scores membership guesses against ground truth.
#[derive(Clone, Debug)]
pub struct Auditor {
    /// Confidence level for intervals.
    pub confidence: f64,
}

impl Default for Auditor {
    fn default() -> Self {
        Self { confidence: 0.95 }
    }
}

impl Auditor {
    /// Create an auditor with a custom confidence level.
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.5, 0.9999),
        }
    }

    /// Compute an epsilon lower bound from TPR/FPR.
    pub fn compute_epsilon_lower(&self, tpr: f64, fpr: f64) -> f64 {
        if fpr <= 0.0 || tpr <= 0.0 {
            return 0.0;
        }
        if fpr >= 1.0 || tpr >= 1.0 {
            return f64::INFINITY;
        }

        let eps1 = (tpr / fpr).ln();
        let eps2 = ((1.0 - fpr) / (1.0 - tpr)).ln();
        eps1.max(eps2).max(0.0)
    }

    /// Two-sided Clopper-Pearson interval for `correct` successes out of `total`.
    pub fn accuracy_interval(&self, correct: usize, total: usize) -> (f64, f64) {
        if total == 0 {
            return (0.0, 1.0);
        }
        let correct = correct.min(total);
        let alpha = 1.0 - self.confidence;
        let (k, n) = (correct as f64, total as f64);
        let lower = if correct == 0 {
            0.0
        } else {
            Beta::new(k, n - k + 1.0)
                .map(|b| b.inverse_cdf(alpha / 2.0))
                .unwrap_or(0.0)
        };
        let upper = if correct == total {
            1.0
        } else {
            Beta::new(k + 1.0, n - k)
                .map(|b| b.inverse_cdf(1.0 - alpha / 2.0))
                .unwrap_or(1.0)
        };
        (lower.clamp(0.0, 1.0), upper.clamp(0.0, 1.0))
    }

    /// Score hard guesses, and optionally the scores behind them.
    ///
    /// `scores` are membership probabilities: higher means "member".
    pub fn audit(
        &self,
        guesses: &[bool],
        truth: &[bool],
        scores: Option<&[f64]>,
    ) -> Result<AuditSummary> {
        let metrics = MembershipMetrics::compute(guesses, truth)?;
        let counts = metrics.counts;
        let epsilon_lower = self.compute_epsilon_lower(counts.tpr(), counts.fpr());

        let auroc = match scores {
            Some(scores) => {
                check_same_len("membership scores", scores.len(), truth.len())?;
                if scores.iter().any(|s| !s.is_finite()) {
                    return Err(MiaError::training("membership scores must be finite"));
                }
                let (members, non_members): (Vec<_>, Vec<_>) =
                    scores.iter().zip(truth).partition(|&(_, &t)| t);
                let members: Vec<f64> = members.into_iter().map(|(&s, _)| s).collect();
                let non_members: Vec<f64> = non_members.into_iter().map(|(&s, _)| s).collect();
                Some(compute_auc(&members, &non_members))
            }
            None => None,
        };

        Ok(AuditSummary {
            metrics,
            epsilon_lower,
            auroc,
            accuracy_interval: self.accuracy_interval(counts.correct(), counts.total()),
        })
    }
}

/// Probability that a random member outscores a random non-member.
fn compute_auc(member_scores: &[f64], non_member_scores: &[f64]) -> f64 {
    if member_scores.is_empty() || non_member_scores.is_empty() {
        return 0.5;
    }

    let mut u = 0.0;
    for &m in member_scores {
        for &n in non_member_scores {
            if m > n {
                u += 1.0;
            } else if (m - n).abs() < 1e-12 {
                u += 0.5;
            }
        }
    }

    u / (member_scores.len() * non_member_scores.len()) as f64
}

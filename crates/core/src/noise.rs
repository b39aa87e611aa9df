//! Salt-and-pepper corruption of image batches.

use ndarray::ArrayView4;
use rand::Rng;

use crate::error::{MiaError, Result};
use crate::tensor::Images;

/// Value written for a "pepper" unit.
pub const PEPPER: u8 = 0;

/// Value written for a "salt" unit.
pub const SALT: u8 = 255;

/// How many scalars share one corruption decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Granularity {
    /// Row-level corruption: one draw per `(sample, row)` pair, applied to
    /// every column and channel of that row.
    #[default]
    Row,
    /// One independent draw per scalar element.
    Element,
}

/// Outcome of a single corruption decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseKind {
    /// Replaced by the minimum value.
    Pepper,
    /// Replaced by the maximum value.
    Salt,
    /// Original value, clamped into the 8-bit range.
    Keep,
}

impl NoiseKind {
    /// Classify a uniform draw in `[0, 1)` against corruption probability `prob`.
    pub fn classify(draw: f64, prob: f64) -> Self {
        if draw < prob {
            Self::Pepper
        } else if draw > 1.0 - prob {
            Self::Salt
        } else {
            Self::Keep
        }
    }

    #[inline]
    fn apply(self, value: f32) -> u8 {
        match self {
            Self::Pepper => PEPPER,
            Self::Salt => SALT,
            // NaN maps to 0 through the saturating cast.
            Self::Keep => value.clamp(0.0, 255.0) as u8,
        }
    }
}

/// Counts of corruption decisions made during one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoiseReport {
    /// Units set to [`PEPPER`].
    pub pepper: usize,
    /// Units set to [`SALT`].
    pub salt: usize,
    /// Units left unchanged.
    pub kept: usize,
}

impl NoiseReport {
    fn record(&mut self, kind: NoiseKind) {
        match kind {
            NoiseKind::Pepper => self.pepper += 1,
            NoiseKind::Salt => self.salt += 1,
            NoiseKind::Keep => self.kept += 1,
        }
    }

    /// Total number of decisions.
    pub fn total(&self) -> usize {
        self.pepper + self.salt + self.kept
    }

    /// Fraction of decisions that corrupted their unit.
    pub fn corrupted_fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.pepper + self.salt) as f64 / total as f64
    }
}

/// Salt-and-pepper noise with corruption probability `prob` per unit.
///
/// A unit becomes pepper with probability `prob`, salt with probability
/// `prob`, and keeps its value otherwise. The output is always 8-bit, so
/// floating-point inputs are truncated even when `prob == 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaltPepper {
    prob: f64,
    granularity: Granularity,
}

impl SaltPepper {
    /// Create a row-level corruptor. `prob` must lie in `[0, 0.5)`.
    pub fn new(prob: f64) -> Result<Self> {
        validate_probability(prob)?;
        Ok(Self {
            prob,
            granularity: Granularity::Row,
        })
    }

    /// Corruptor that only truncates into the 8-bit range.
    pub fn clean() -> Self {
        Self {
            prob: 0.0,
            granularity: Granularity::Row,
        }
    }

    /// Select the corruption granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Corruption probability for each of salt and pepper.
    pub fn prob(&self) -> f64 {
        self.prob
    }

    /// Configured granularity.
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Corrupt a batch of images.
    pub fn corrupt<R: Rng + ?Sized>(&self, images: ArrayView4<'_, f32>, rng: &mut R) -> Images {
        self.corrupt_with_report(images, rng).0
    }

    /// Corrupt a batch of images and report how many units were touched.
    ///
    /// Draws happen in logical order: samples, then rows, then (for
    /// [`Granularity::Element`]) columns and channels.
    pub fn corrupt_with_report<R: Rng + ?Sized>(
        &self,
        images: ArrayView4<'_, f32>,
        rng: &mut R,
    ) -> (Images, NoiseReport) {
        let mut out = Images::zeros(images.raw_dim());
        let mut report = NoiseReport::default();

        match self.granularity {
            Granularity::Row => {
                for (mut out_sample, in_sample) in out.outer_iter_mut().zip(images.outer_iter()) {
                    for (mut out_row, in_row) in
                        out_sample.outer_iter_mut().zip(in_sample.outer_iter())
                    {
                        let kind = NoiseKind::classify(rng.gen::<f64>(), self.prob);
                        report.record(kind);
                        for (o, &v) in out_row.iter_mut().zip(in_row.iter()) {
                            *o = kind.apply(v);
                        }
                    }
                }
            }
            Granularity::Element => {
                for (o, &v) in out.iter_mut().zip(images.iter()) {
                    let kind = NoiseKind::classify(rng.gen::<f64>(), self.prob);
                    report.record(kind);
                    *o = kind.apply(v);
                }
            }
        }

        tracing::debug!(
            prob = self.prob,
            granularity = ?self.granularity,
            pepper = report.pepper,
            salt = report.salt,
            kept = report.kept,
            "applied salt-and-pepper noise"
        );
        (out, report)
    }
}

/// Reject probabilities for which the salt and pepper regions would overlap.
pub fn validate_probability(prob: f64) -> Result<()> {
    if !prob.is_finite() || !(0.0..0.5).contains(&prob) {
        return Err(MiaError::config(format!(
            "salt-and-pepper probability must be in [0, 0.5), got {prob}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ramp(shape: (usize, usize, usize, usize)) -> Array4<f32> {
        let len = shape.0 * shape.1 * shape.2 * shape.3;
        Array4::from_shape_vec(shape, (0..len).map(|i| (i % 256) as f32).collect())
            .expect("shape matches")
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(NoiseKind::classify(0.05, 0.1), NoiseKind::Pepper);
        assert_eq!(NoiseKind::classify(0.95, 0.1), NoiseKind::Salt);
        assert_eq!(NoiseKind::classify(0.5, 0.1), NoiseKind::Keep);
        // The salt comparison is strict.
        assert_eq!(NoiseKind::classify(0.9, 0.1), NoiseKind::Keep);
    }

    #[test]
    fn test_rejects_invalid_probability() {
        for p in [0.5, 0.75, 1.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                SaltPepper::new(p),
                Err(MiaError::InvalidConfig { .. })
            ));
        }
        assert!(SaltPepper::new(0.0).is_ok());
        assert!(SaltPepper::new(0.499).is_ok());
    }

    #[test]
    fn test_deterministic_under_seed() {
        let images = ramp((4, 8, 8, 3));
        let noise = SaltPepper::new(0.2).expect("valid prob");
        let a = noise.corrupt(images.view(), &mut ChaCha8Rng::seed_from_u64(42));
        let b = noise.corrupt(images.view(), &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_probability_only_clamps() {
        let mut images = ramp((2, 4, 4, 3));
        images[[0, 0, 0, 0]] = -7.5;
        images[[1, 3, 3, 2]] = 300.0;
        images[[1, 0, 0, 1]] = 12.9;
        let out = SaltPepper::clean().corrupt(images.view(), &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(out.dim(), images.dim());
        assert_eq!(out[[0, 0, 0, 0]], 0);
        assert_eq!(out[[1, 3, 3, 2]], 255);
        assert_eq!(out[[1, 0, 0, 1]], 12);
        for (o, &v) in out.iter().zip(images.iter()) {
            assert_eq!(*o, v.clamp(0.0, 255.0) as u8);
        }
    }

    #[test]
    fn test_row_level_decision_covers_whole_row() {
        let images = Array4::from_elem((50, 6, 5, 3), 100.0f32);
        let noise = SaltPepper::new(0.3).expect("valid prob");
        let out = noise.corrupt(images.view(), &mut ChaCha8Rng::seed_from_u64(7));
        for sample in out.outer_iter() {
            for row in sample.outer_iter() {
                let first = row[[0, 0]];
                assert!(row.iter().all(|&v| v == first));
                assert!(first == PEPPER || first == SALT || first == 100);
            }
        }
    }

    #[test]
    fn test_row_fraction_converges_to_two_p() {
        let p = 0.45;
        let images = Array4::from_elem((400, 32, 2, 1), 100.0f32);
        let noise = SaltPepper::new(p).expect("valid prob");
        let (out, report) =
            noise.corrupt_with_report(images.view(), &mut ChaCha8Rng::seed_from_u64(2024));
        assert_eq!(report.total(), 400 * 32);
        let mut corrupted = 0usize;
        for sample in out.outer_iter() {
            for row in sample.outer_iter() {
                if row[[0, 0]] != 100 {
                    corrupted += 1;
                }
            }
        }
        let frac = corrupted as f64 / (400.0 * 32.0);
        assert!((frac - 2.0 * p).abs() < 0.02, "fraction {frac}");
        assert!((report.corrupted_fraction() - frac).abs() < 1e-12);
        // Salt and pepper are equally likely.
        let balance = report.salt as f64 / (report.salt + report.pepper) as f64;
        assert!((balance - 0.5).abs() < 0.03);
    }

    #[test]
    fn test_element_granularity_draws_per_scalar() {
        let images = Array4::from_elem((2, 3, 4, 3), 50.0f32);
        let noise = SaltPepper::new(0.4)
            .expect("valid prob")
            .with_granularity(Granularity::Element);
        let (_, report) =
            noise.corrupt_with_report(images.view(), &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(report.total(), images.len());
    }

    proptest! {
        #[test]
        fn prop_shape_and_values_preserved(
            prob in 0.0f64..0.499,
            seed in any::<u64>(),
            element in any::<bool>(),
        ) {
            let images = ramp((3, 5, 4, 2));
            let granularity = if element { Granularity::Element } else { Granularity::Row };
            let noise = SaltPepper::new(prob).expect("valid prob").with_granularity(granularity);
            let out = noise.corrupt(images.view(), &mut ChaCha8Rng::seed_from_u64(seed));
            prop_assert_eq!(out.dim(), images.dim());
            for (o, &v) in out.iter().zip(images.iter()) {
                prop_assert!(*o == PEPPER || *o == SALT || *o == v as u8);
            }
        }
    }
}

//! Experiment configuration.
//!
//! One immutable [`ExperimentConfig`] describes a full noise sweep. It is
//! validated before any data is loaded.

use mia_core::{validate_probability, Granularity, MiaError, Result};
use mia_estimators::DEFAULT_SHADOW_SEED;

/// Default epochs for target and shadow models.
pub const DEFAULT_TARGET_EPOCHS: usize = 12;
/// Default number of shadow models.
pub const DEFAULT_NUM_SHADOWS: usize = 10;
/// Default epochs for attack models.
pub const DEFAULT_ATTACK_EPOCHS: usize = 12;
/// Default training-set size of every shadow model.
pub const DEFAULT_SHADOW_DATASET_SIZE: usize = 4000;
/// Default number of in and of out samples used to evaluate the attack.
pub const DEFAULT_ATTACK_TEST_SIZE: usize = 4000;
/// Default noise increment between sweep rounds.
pub const DEFAULT_NOISE_STEP: f64 = 1.0 / 40.0;

/// Evenly spaced noise strengths `0, step, 2 * step, ...`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseSweep {
    /// Number of rounds.
    pub rounds: usize,
    /// Increment per round.
    pub step: f64,
}

impl Default for NoiseSweep {
    fn default() -> Self {
        Self {
            rounds: 1,
            step: DEFAULT_NOISE_STEP,
        }
    }
}

impl NoiseSweep {
    /// Noise strength of every round.
    pub fn levels(&self) -> Vec<f64> {
        (0..self.rounds).map(|r| r as f64 * self.step).collect()
    }
}

/// Parameters of a membership-inference experiment.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentConfig {
    /// Epochs for target and shadow models.
    pub target_epochs: usize,
    /// Number of shadow models.
    pub num_shadows: usize,
    /// Epochs for attack models.
    pub attack_epochs: usize,
    /// Training-set size of every shadow model.
    pub shadow_dataset_size: usize,
    /// Number of in and of out samples used to evaluate the attack.
    pub attack_test_size: usize,
    /// Fraction of the target's training data held out for validation.
    pub target_validation_split: f64,
    /// Fraction of the attacker's pool held out for shadow validation.
    pub attacker_test_fraction: f64,
    /// Salt-and-pepper probability of each round.
    pub noise_levels: Vec<f64>,
    /// Corruption granularity.
    pub granularity: Granularity,
    /// Mini-batch size for every model.
    pub batch_size: usize,
    /// Base seed; round `r` uses `seed + r`.
    pub seed: u64,
    /// Per-epoch training logs.
    pub verbose: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            target_epochs: DEFAULT_TARGET_EPOCHS,
            num_shadows: DEFAULT_NUM_SHADOWS,
            attack_epochs: DEFAULT_ATTACK_EPOCHS,
            shadow_dataset_size: DEFAULT_SHADOW_DATASET_SIZE,
            attack_test_size: DEFAULT_ATTACK_TEST_SIZE,
            target_validation_split: 0.1,
            attacker_test_fraction: 0.1,
            noise_levels: NoiseSweep::default().levels(),
            granularity: Granularity::Row,
            batch_size: 64,
            seed: DEFAULT_SHADOW_SEED,
            verbose: false,
        }
    }
}

impl ExperimentConfig {
    /// Replace the noise levels with an evenly spaced sweep.
    pub fn with_sweep(mut self, sweep: NoiseSweep) -> Self {
        self.noise_levels = sweep.levels();
        self
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.target_epochs == 0 {
            return Err(MiaError::config("target_epochs must be positive"));
        }
        if self.attack_epochs == 0 {
            return Err(MiaError::config("attack_epochs must be positive"));
        }
        if self.num_shadows == 0 {
            return Err(MiaError::config("num_shadows must be positive"));
        }
        if self.shadow_dataset_size == 0 {
            return Err(MiaError::config("shadow_dataset_size must be positive"));
        }
        if self.attack_test_size == 0 {
            return Err(MiaError::config("attack_test_size must be positive"));
        }
        if self.batch_size == 0 {
            return Err(MiaError::config("batch_size must be positive"));
        }
        for (name, f) in [
            ("target_validation_split", self.target_validation_split),
            ("attacker_test_fraction", self.attacker_test_fraction),
        ] {
            if !(f > 0.0 && f < 1.0) {
                return Err(MiaError::config(format!("{name} must be in (0, 1), got {f}")));
            }
        }
        if self.noise_levels.is_empty() {
            return Err(MiaError::config("at least one noise level is required"));
        }
        for &p in &self.noise_levels {
            validate_probability(p)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ExperimentConfig::default();
        cfg.validate().expect("defaults");
        assert_eq!(cfg.noise_levels, vec![0.0]);
        assert_eq!(cfg.target_epochs, 12);
        assert_eq!(cfg.num_shadows, 10);
        assert_eq!(cfg.attack_epochs, 12);
    }

    #[test]
    fn sweep_levels_step_by_fortieths() {
        let levels = NoiseSweep {
            rounds: 3,
            step: DEFAULT_NOISE_STEP,
        }
        .levels();
        assert_eq!(levels, vec![0.0, 0.025, 0.05]);
    }

    #[test]
    fn rejects_zero_epochs() {
        let cfg = ExperimentConfig {
            target_epochs: 0,
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(MiaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn rejects_noise_at_one_half() {
        let cfg = ExperimentConfig::default().with_sweep(NoiseSweep {
            rounds: 21,
            step: DEFAULT_NOISE_STEP,
        });
        assert!(cfg.validate().is_err());
        let cfg = ExperimentConfig::default().with_sweep(NoiseSweep {
            rounds: 20,
            step: DEFAULT_NOISE_STEP,
        });
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_fractions() {
        let cfg = ExperimentConfig {
            attacker_test_fraction: 0.0,
            ..ExperimentConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}

//! Membership-inference attack experiments against image classifiers.
//!
//! A target classifier is trained on a (possibly salt-and-pepper corrupted)
//! dataset, shadow models imitate it on attacker-owned data, and per-class
//! attack models learn to tell training members from non-members. This
//! crate wires those pieces together and re-exports the building blocks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod experiment;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use mia_audit as audit;
pub use mia_core as core;
pub use mia_estimators as estimators;

pub use mia_audit::{AuditSummary, Auditor, ConfusionCounts, MembershipMetrics};
pub use config::{
    ExperimentConfig, NoiseSweep, DEFAULT_ATTACK_EPOCHS, DEFAULT_ATTACK_TEST_SIZE,
    DEFAULT_NOISE_STEP, DEFAULT_NUM_SHADOWS, DEFAULT_SHADOW_DATASET_SIZE, DEFAULT_TARGET_EPOCHS,
};
pub use mia_core::{
    load_data, Cifar10Dir, DatasetSource, Granularity, InMemorySource, MiaError, Result,
    SaltPepper, Split, SyntheticSource, NUM_CLASSES,
};
pub use mia_estimators::{
    prepare_attack_data, AttackModelBundle, Classifier, FitConfig, Mlp, MlpConfig, MlpFactory,
    ModelFactory, ShadowModelBundle,
};
pub use experiment::{build_eval_set, Experiment, RoundReport, Stage};

/// Convenience prelude covering the experiment and its building blocks.
pub mod prelude {
    pub use crate::config::{ExperimentConfig, NoiseSweep};
    pub use crate::experiment::{build_eval_set, Experiment, RoundReport, Stage};
    pub use mia_audit::prelude::*;
    pub use mia_core::prelude::*;
    pub use mia_estimators::prelude::*;
}

//! Shadow-model and attack-model estimators for membership inference.
//!
//! The crate defines the capability a trainable model must provide
//! ([`Classifier`], built by a [`ModelFactory`]), a dense network
//! implementing it, and the two bundles that turn such models into a
//! membership-inference attack.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attack;
pub mod data;
pub mod mlp;
pub mod model;
pub mod shadow;
pub mod test_utils;

pub use attack::{AttackModelBundle, MEMBERSHIP_THRESHOLD, UNTRAINED_CLASS_SCORE};
pub use data::{prepare_attack_data, AttackInput, ProbabilityVector, ShadowDataset, ShadowRecord};
pub use mlp::{Mlp, MlpConfig, MlpFactory};
pub use model::{Classifier, FitConfig, FitHistory, ModelFactory, Validation};
pub use shadow::{ShadowModelBundle, DEFAULT_SHADOW_SEED};

/// Common imports for estimator users.
pub mod prelude {
    pub use crate::{
        prepare_attack_data, AttackInput, AttackModelBundle, Classifier, FitConfig, FitHistory,
        Mlp, MlpConfig, MlpFactory, ModelFactory, ProbabilityVector, ShadowDataset,
        ShadowModelBundle, ShadowRecord, Validation,
    };
}

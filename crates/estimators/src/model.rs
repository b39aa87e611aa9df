//! Model capabilities shared by target, shadow and attack models.

use ndarray::{Array2, ArrayView2};

use mia_core::{MiaError, Result};

/// Data held out for monitoring during fitting.
#[derive(Clone, Debug, Default)]
pub enum Validation<'a> {
    /// No validation.
    #[default]
    None,
    /// Hold out the trailing fraction of the training rows.
    Split(f64),
    /// Explicit validation data.
    Data {
        /// Validation inputs.
        features: ArrayView2<'a, f32>,
        /// Validation labels.
        labels: ArrayView2<'a, f32>,
    },
}

/// Parameters of one `fit` call.
#[derive(Clone, Debug)]
pub struct FitConfig<'a> {
    /// Passes over the training data.
    pub epochs: usize,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Log every epoch at info level.
    pub verbose: bool,
    /// Validation data or split.
    pub validation: Validation<'a>,
}

impl<'a> FitConfig<'a> {
    /// Config with the given epoch count, batches of 32 and no validation.
    pub fn new(epochs: usize) -> Self {
        Self {
            epochs,
            batch_size: 32,
            verbose: false,
            validation: Validation::None,
        }
    }

    /// Set the mini-batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Toggle per-epoch logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Attach validation data or a validation split.
    pub fn with_validation(mut self, validation: Validation<'a>) -> Self {
        self.validation = validation;
        self
    }

    /// Validate parameters.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(MiaError::config("epochs must be positive"));
        }
        if self.batch_size == 0 {
            return Err(MiaError::config("batch_size must be positive"));
        }
        match &self.validation {
            Validation::None => {}
            Validation::Split(f) => {
                if !(*f > 0.0 && *f < 1.0) {
                    return Err(MiaError::config(format!(
                        "validation split must be in (0, 1), got {f}"
                    )));
                }
            }
            Validation::Data { features, labels } => {
                mia_core::check_same_len("validation data", features.nrows(), labels.nrows())?;
            }
        }
        Ok(())
    }
}

/// Per-epoch training curves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitHistory {
    /// Training loss.
    pub loss: Vec<f64>,
    /// Training accuracy.
    pub accuracy: Vec<f64>,
    /// Validation loss, empty without validation.
    pub val_loss: Vec<f64>,
    /// Validation accuracy, empty without validation.
    pub val_accuracy: Vec<f64>,
}

impl FitHistory {
    /// Loss after the last epoch.
    pub fn final_loss(&self) -> Option<f64> {
        self.loss.last().copied()
    }

    /// Training accuracy after the last epoch.
    pub fn final_accuracy(&self) -> Option<f64> {
        self.accuracy.last().copied()
    }
}

/// A trainable model producing probability vectors.
///
/// Labels of width one describe a binary task and predictions are the
/// probability of the positive class; wider labels are one-hot classes and
/// predictions are distributions over them.
pub trait Classifier {
    /// Train on `features` (one row per sample) and `labels`.
    fn fit(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        config: &FitConfig<'_>,
    ) -> Result<FitHistory>;

    /// Predict one probability row per input row.
    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>>;
}

/// Produces fresh, untrained models.
///
/// The caller supplies the seed, so a model depends only on where it is
/// built and not on how many models the factory built before.
pub trait ModelFactory {
    /// Model type built by this factory.
    type Model: Classifier;

    /// Build an untrained model from `seed`.
    fn build(&self, seed: u64) -> Self::Model;
}

impl<F, M> ModelFactory for F
where
    F: Fn(u64) -> M,
    M: Classifier,
{
    type Model = M;

    fn build(&self, seed: u64) -> M {
        self(seed)
    }
}

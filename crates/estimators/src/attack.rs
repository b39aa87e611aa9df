//! Per-class membership classifiers.

use ndarray::Array2;

use mia_core::{MiaError, Result};

use crate::data::{AttackInput, ShadowDataset};
use crate::model::{Classifier, FitConfig, ModelFactory};

/// Membership score used for classes that had no shadow records.
pub const UNTRAINED_CLASS_SCORE: f64 = 0.5;

/// Decision threshold on membership probabilities.
pub const MEMBERSHIP_THRESHOLD: f64 = 0.5;

/// One binary membership classifier per class.
///
/// Each query is routed to the model of its true class, which sees only the
/// probability vector.
pub struct AttackModelBundle<F: ModelFactory, const C: usize> {
    factory: F,
    seed: u64,
    models: Vec<Option<F::Model>>,
}

impl<F: ModelFactory, const C: usize> AttackModelBundle<F, C> {
    /// Untrained bundle over `C` classes.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            seed: 0,
            models: Vec::new(),
        }
    }

    /// Base build seed; the model of class `c` is built with `seed + c`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        C
    }

    /// Whether `fit` has completed.
    pub fn is_fitted(&self) -> bool {
        self.models.len() == C
    }

    /// Classes that received a trained model.
    pub fn trained_classes(&self) -> Vec<usize> {
        self.models
            .iter()
            .enumerate()
            .filter_map(|(c, m)| m.as_ref().map(|_| c))
            .collect()
    }

    /// Train one model per class on that class's shadow records.
    pub fn fit(&mut self, shadow: &ShadowDataset<C>, config: &FitConfig<'_>) -> Result<()> {
        config.validate()?;
        if let Some(bad) = shadow.records().iter().find(|r| r.class >= C) {
            return Err(MiaError::shape(format!(
                "shadow record has class {} but the bundle covers {C} classes",
                bad.class
            )));
        }

        let mut models = Vec::with_capacity(C);
        for class in 0..C {
            let records: Vec<_> = shadow.by_class(class).collect();
            if records.is_empty() {
                tracing::warn!(class, "no shadow records; queries for this class score out");
                models.push(None);
                continue;
            }
            let features = Array2::from_shape_fn((records.len(), C), |(i, j)| {
                records[i].probs.as_array()[j]
            });
            let labels = Array2::from_shape_fn((records.len(), 1), |(i, _)| {
                if records[i].member {
                    1.0
                } else {
                    0.0
                }
            });

            tracing::info!(class, records = records.len(), "training attack model");
            let mut model = self.factory.build(self.seed.wrapping_add(class as u64));
            model.fit(features.view(), labels.view(), config)?;
            models.push(Some(model));
        }
        self.models = models;
        Ok(())
    }

    /// Probability that each input was a training member.
    pub fn predict_proba(&self, inputs: &[AttackInput<C>]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(MiaError::training("attack models have not been fitted"));
        }
        let mut scores = vec![UNTRAINED_CLASS_SCORE; inputs.len()];
        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); C];
        for (i, input) in inputs.iter().enumerate() {
            if input.class >= C {
                return Err(MiaError::shape(format!(
                    "query class {} outside 0..{C}",
                    input.class
                )));
            }
            by_class[input.class].push(i);
        }

        for (class, rows) in by_class.iter().enumerate() {
            let Some(model) = &self.models[class] else {
                continue;
            };
            if rows.is_empty() {
                continue;
            }
            let features = Array2::from_shape_fn((rows.len(), C), |(i, j)| {
                inputs[rows[i]].probs.as_array()[j]
            });
            let probs = model.predict_proba(features.view())?;
            if probs.nrows() != rows.len() || probs.ncols() != 1 {
                return Err(MiaError::shape(format!(
                    "attack model for class {class} returned {:?}, expected ({}, 1)",
                    probs.dim(),
                    rows.len()
                )));
            }
            for (&row, &p) in rows.iter().zip(probs.iter()) {
                scores[row] = p as f64;
            }
        }
        Ok(scores)
    }

    /// Membership guesses: `true` when the score exceeds one half.
    pub fn predict(&self, inputs: &[AttackInput<C>]) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(inputs)?
            .into_iter()
            .map(|p| p > MEMBERSHIP_THRESHOLD)
            .collect())
    }
}

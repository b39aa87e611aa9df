//! Shadow models trained on disjoint in/out splits of the attacker's data.

use ndarray::{ArrayView2, Axis};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use mia_core::{check_same_len, MiaError, Result};

use crate::data::{prepare_attack_data, ShadowDataset};
use crate::model::{Classifier, FitConfig, ModelFactory};

/// Default seed for shadow index selection.
pub const DEFAULT_SHADOW_SEED: u64 = 42;

/// A population of shadow models mimicking the target.
///
/// Each model draws `2 * shadow_dataset_size` distinct rows from the
/// attacker's pool: the first half trains the model, the second half is held
/// out. Both halves are then run through the model to produce labelled
/// attack training data.
pub struct ShadowModelBundle<F: ModelFactory> {
    factory: F,
    shadow_dataset_size: usize,
    num_models: usize,
    seed: u64,
    models: Vec<F::Model>,
    train_indices: Vec<Vec<usize>>,
    test_indices: Vec<Vec<usize>>,
}

impl<F: ModelFactory> ShadowModelBundle<F> {
    /// Bundle of `num_models` shadows, each trained on `shadow_dataset_size` rows.
    pub fn new(factory: F, shadow_dataset_size: usize, num_models: usize) -> Self {
        Self {
            factory,
            shadow_dataset_size,
            num_models,
            seed: DEFAULT_SHADOW_SEED,
            models: Vec::new(),
            train_indices: Vec::new(),
            test_indices: Vec::new(),
        }
    }

    /// Seed for index selection. Shadow `i` is built with `seed + i`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of shadow models.
    pub fn num_models(&self) -> usize {
        self.num_models
    }

    /// Trained shadow models.
    pub fn models(&self) -> &[F::Model] {
        &self.models
    }

    /// Rows each shadow model was trained on.
    pub fn train_indices(&self) -> &[Vec<usize>] {
        &self.train_indices
    }

    /// Rows each shadow model held out.
    pub fn test_indices(&self) -> &[Vec<usize>] {
        &self.test_indices
    }

    fn validate(&self, pool: usize) -> Result<()> {
        if self.num_models == 0 {
            return Err(MiaError::config("num_models must be positive"));
        }
        if self.shadow_dataset_size == 0 {
            return Err(MiaError::config("shadow_dataset_size must be positive"));
        }
        let needed = self.shadow_dataset_size.saturating_mul(2);
        if needed > pool {
            return Err(MiaError::config(format!(
                "each shadow model needs {needed} samples but the attacker pool has {pool}"
            )));
        }
        Ok(())
    }

    /// Train every shadow model, then collect their in/out outputs.
    pub fn fit_transform<const C: usize>(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        config: &FitConfig<'_>,
    ) -> Result<ShadowDataset<C>> {
        self.fit(features, labels, config)?;
        self.transform(features, labels)
    }

    /// Train every shadow model on its own split of the pool.
    pub fn fit(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        config: &FitConfig<'_>,
    ) -> Result<()> {
        check_same_len("shadow pool", features.nrows(), labels.nrows())?;
        self.validate(features.nrows())?;
        config.validate()?;

        self.models.clear();
        self.train_indices.clear();
        self.test_indices.clear();

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let size = self.shadow_dataset_size;
        for i in 0..self.num_models {
            let mut picked = index::sample(&mut rng, features.nrows(), 2 * size).into_vec();
            let held_out = picked.split_off(size);

            tracing::info!(
                shadow = i + 1,
                of = self.num_models,
                train = picked.len(),
                "training shadow model"
            );
            let mut model = self.factory.build(self.seed.wrapping_add(i as u64));
            model.fit(
                features.select(Axis(0), &picked).view(),
                labels.select(Axis(0), &picked).view(),
                config,
            )?;

            self.models.push(model);
            self.train_indices.push(picked);
            self.test_indices.push(held_out);
        }
        Ok(())
    }

    /// Run each trained shadow over its in and out rows.
    ///
    /// `features` and `labels` must be the pool passed to [`fit`](Self::fit).
    pub fn transform<const C: usize>(
        &self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
    ) -> Result<ShadowDataset<C>> {
        if self.models.is_empty() {
            return Err(MiaError::training("shadow models have not been fitted"));
        }
        let mut dataset = ShadowDataset::default();
        for ((model, train), test) in self
            .models
            .iter()
            .zip(&self.train_indices)
            .zip(&self.test_indices)
        {
            let x_in = features.select(Axis(0), train);
            let y_in = labels.select(Axis(0), train);
            let x_out = features.select(Axis(0), test);
            let y_out = labels.select(Axis(0), test);
            let (inputs, members) = prepare_attack_data::<_, C>(
                model,
                (x_in.view(), y_in.view()),
                (x_out.view(), y_out.view()),
            )?;
            dataset.extend(ShadowDataset::from_parts(inputs, members)?);
        }
        tracing::debug!(
            records = dataset.len(),
            members = dataset.members(),
            "collected shadow records"
        );
        Ok(dataset)
    }
}

//! Dense feed-forward classifier trained with mini-batch SGD.

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};

use mia_core::{argmax_rows, check_same_len, MiaError, Result};

use crate::model::{Classifier, FitConfig, FitHistory, ModelFactory, Validation};

const PROB_EPS: f32 = 1e-7;

/// Hyperparameters of an [`Mlp`].
#[derive(Clone, Debug, PartialEq)]
pub struct MlpConfig {
    /// Width of each ReLU hidden layer.
    pub hidden: Vec<usize>,
    /// SGD step size.
    pub learning_rate: f32,
    /// Momentum coefficient in `[0, 1)`.
    pub momentum: f32,
    /// Seed for weight initialization and shuffling.
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self::target()
    }
}

impl MlpConfig {
    /// Image classifier used for target and shadow models.
    pub fn target() -> Self {
        Self {
            hidden: vec![128],
            learning_rate: 0.01,
            momentum: 0.9,
            seed: 0,
        }
    }

    /// Per-class membership classifier.
    pub fn attack() -> Self {
        Self {
            hidden: vec![64, 64],
            learning_rate: 0.01,
            momentum: 0.9,
            seed: 0,
        }
    }

    /// Replace the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(MiaError::config("learning_rate must be positive"));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(MiaError::config("momentum must be in [0, 1)"));
        }
        if self.hidden.iter().any(|&h| h == 0) {
            return Err(MiaError::config("hidden layer widths must be positive"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Head {
    Softmax,
    Sigmoid,
}

impl Head {
    fn for_width(width: usize) -> Self {
        if width == 1 {
            Self::Sigmoid
        } else {
            Self::Softmax
        }
    }

    fn activate(self, z: &mut Array2<f32>) {
        match self {
            Self::Sigmoid => z.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
            Self::Softmax => {
                for mut row in z.rows_mut() {
                    let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum = row.sum();
                    row.mapv_inplace(|v| v / sum);
                }
            }
        }
    }

    /// Mean cross-entropy of `probs` against `labels`.
    fn loss(self, probs: &Array2<f32>, labels: ArrayView2<'_, f32>) -> f64 {
        if probs.iter().any(|p| !p.is_finite()) {
            return f64::NAN;
        }
        let n = probs.nrows().max(1) as f64;
        let total: f64 = match self {
            Self::Softmax => Zip::from(probs)
                .and(labels)
                .fold(0.0, |acc, &p, &y| acc - (y * p.max(PROB_EPS).ln()) as f64),
            Self::Sigmoid => Zip::from(probs).and(labels).fold(0.0, |acc, &p, &y| {
                let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
                acc - (y * p.ln() + (1.0 - y) * (1.0 - p).ln()) as f64
            }),
        };
        total / n
    }

    fn accuracy(self, probs: &Array2<f32>, labels: ArrayView2<'_, f32>) -> f64 {
        let n = probs.nrows();
        if n == 0 {
            return 0.0;
        }
        let correct = match self {
            Self::Softmax => argmax_rows(probs.view())
                .into_iter()
                .zip(argmax_rows(labels))
                .filter(|(p, y)| p == y)
                .count(),
            Self::Sigmoid => probs
                .iter()
                .zip(labels.iter())
                .filter(|&(&p, &y)| (p > 0.5) == (y > 0.5))
                .count(),
        };
        correct as f64 / n as f64
    }
}

#[derive(Clone, Debug)]
struct Dense {
    weights: Array2<f32>,
    bias: Array1<f32>,
    weight_velocity: Array2<f32>,
    bias_velocity: Array1<f32>,
}

impl Dense {
    /// Glorot-uniform initialization.
    fn new(inputs: usize, outputs: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f32).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| dist.sample(&mut *rng)),
            bias: Array1::zeros(outputs),
            weight_velocity: Array2::zeros((inputs, outputs)),
            bias_velocity: Array1::zeros(outputs),
        }
    }

    fn step(&mut self, grad_w: &Array2<f32>, grad_b: &Array1<f32>, lr: f32, momentum: f32) {
        Zip::from(&mut self.weight_velocity)
            .and(grad_w)
            .for_each(|v, &g| *v = momentum * *v - lr * g);
        Zip::from(&mut self.bias_velocity)
            .and(grad_b)
            .for_each(|v, &g| *v = momentum * *v - lr * g);
        self.weights += &self.weight_velocity;
        self.bias += &self.bias_velocity;
    }
}

/// Multi-layer perceptron with ReLU hidden layers.
///
/// The output layer is sized from the labels on the first `fit` call.
/// Later calls continue training the same weights.
#[derive(Clone, Debug)]
pub struct Mlp {
    config: MlpConfig,
    layers: Vec<Dense>,
    head: Head,
    rng: ChaCha8Rng,
}

impl Mlp {
    /// Untrained network.
    pub fn new(config: MlpConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            layers: Vec::new(),
            head: Head::Softmax,
            rng,
        }
    }

    /// Hyperparameters.
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }

    /// Whether `fit` has been called.
    pub fn is_fitted(&self) -> bool {
        !self.layers.is_empty()
    }

    fn input_dim(&self) -> Option<usize> {
        self.layers.first().map(|l| l.weights.nrows())
    }

    fn output_dim(&self) -> Option<usize> {
        self.layers.last().map(|l| l.weights.ncols())
    }

    fn build_layers(&mut self, inputs: usize, outputs: usize) {
        let mut widths = Vec::with_capacity(self.config.hidden.len() + 2);
        widths.push(inputs);
        widths.extend_from_slice(&self.config.hidden);
        widths.push(outputs);
        let rng = &mut self.rng;
        let layers = widths
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], rng))
            .collect();
        self.layers = layers;
        self.head = Head::for_width(outputs);
    }

    /// Activations of every layer; the first entry is the input itself.
    fn forward(&self, x: ArrayView2<'_, f32>) -> Vec<Array2<f32>> {
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(x.to_owned());
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = acts[i].dot(&layer.weights) + &layer.bias;
            if i == last {
                self.head.activate(&mut z);
            } else {
                z.mapv_inplace(|v| v.max(0.0));
            }
            acts.push(z);
        }
        acts
    }

    fn train_batch(&mut self, x: ArrayView2<'_, f32>, y: ArrayView2<'_, f32>) -> f64 {
        let acts = self.forward(x);
        let probs = &acts[acts.len() - 1];
        let loss = self.head.loss(probs, y);

        // Softmax and sigmoid heads share the same logit gradient under cross-entropy.
        let mut delta = (probs - &y) / x.nrows() as f32;
        let (lr, momentum) = (self.config.learning_rate, self.config.momentum);
        for i in (0..self.layers.len()).rev() {
            let a_prev = &acts[i];
            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            let next_delta = if i > 0 {
                let mut d = delta.dot(&self.layers[i].weights.t());
                Zip::from(&mut d).and(a_prev).for_each(|d, &a| {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                });
                Some(d)
            } else {
                None
            };
            self.layers[i].step(&grad_w, &grad_b, lr, momentum);
            if let Some(d) = next_delta {
                delta = d;
            }
        }
        loss
    }

    fn evaluate(&self, x: ArrayView2<'_, f32>, y: ArrayView2<'_, f32>) -> (f64, f64) {
        let acts = self.forward(x);
        let probs = &acts[acts.len() - 1];
        (self.head.loss(probs, y), self.head.accuracy(probs, y))
    }
}

impl Classifier for Mlp {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        config: &FitConfig<'_>,
    ) -> Result<FitHistory> {
        config.validate()?;
        self.config.validate()?;
        check_same_len("fit", features.nrows(), labels.nrows())?;
        if labels.ncols() == 0 {
            return Err(MiaError::shape("labels must have at least one column"));
        }

        let (train_x, train_y, val) = match &config.validation {
            Validation::None => (features.view(), labels.view(), None),
            Validation::Split(f) => {
                let split_at = (features.nrows() as f64 * (1.0 - f)).floor() as usize;
                let (tx, vx) = features.view().split_at(Axis(0), split_at);
                let (ty, vy) = labels.view().split_at(Axis(0), split_at);
                let val = if vx.nrows() > 0 { Some((vx, vy)) } else { None };
                (tx, ty, val)
            }
            Validation::Data {
                features: vx,
                labels: vy,
            } => (features.view(), labels.view(), Some((vx.view(), vy.view()))),
        };

        let n = train_x.nrows();
        if n == 0 {
            return Err(MiaError::training("no training samples"));
        }

        match (self.input_dim(), self.output_dim()) {
            (None, _) => self.build_layers(train_x.ncols(), train_y.ncols()),
            (Some(i), Some(o)) if i == train_x.ncols() && o == train_y.ncols() => {}
            (Some(i), o) => {
                return Err(MiaError::training(format!(
                    "model fitted for {i} inputs and {o:?} outputs, got {} and {}",
                    train_x.ncols(),
                    train_y.ncols()
                )));
            }
        }
        if let Some((vx, vy)) = &val {
            check_same_len("validation", vx.nrows(), vy.nrows())?;
            if vx.ncols() != train_x.ncols() || vy.ncols() != train_y.ncols() {
                return Err(MiaError::shape("validation data width differs from training data"));
            }
        }

        let mut history = FitHistory::default();
        let mut order: Vec<usize> = (0..n).collect();
        for epoch in 0..config.epochs {
            order.shuffle(&mut self.rng);
            let mut loss_sum = 0.0;
            for chunk in order.chunks(config.batch_size) {
                let bx = train_x.select(Axis(0), chunk);
                let by = train_y.select(Axis(0), chunk);
                loss_sum += self.train_batch(bx.view(), by.view()) * chunk.len() as f64;
            }
            let loss = loss_sum / n as f64;
            if !loss.is_finite() {
                return Err(MiaError::training(format!(
                    "loss diverged at epoch {}",
                    epoch + 1
                )));
            }
            let (_, accuracy) = self.evaluate(train_x, train_y);
            history.loss.push(loss);
            history.accuracy.push(accuracy);
            if let Some((vx, vy)) = &val {
                let (val_loss, val_accuracy) = self.evaluate(vx.view(), vy.view());
                history.val_loss.push(val_loss);
                history.val_accuracy.push(val_accuracy);
            }

            if config.verbose {
                tracing::info!(
                    epoch = epoch + 1,
                    epochs = config.epochs,
                    loss,
                    accuracy,
                    val_loss = history.val_loss.last().copied(),
                    val_accuracy = history.val_accuracy.last().copied(),
                    "epoch finished"
                );
            } else {
                tracing::trace!(epoch = epoch + 1, loss, accuracy, "epoch finished");
            }
        }
        Ok(history)
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let Some(inputs) = self.input_dim() else {
            return Err(MiaError::training("model has not been fitted"));
        };
        if features.ncols() != inputs {
            return Err(MiaError::shape(format!(
                "model expects {inputs} features, got {}",
                features.ncols()
            )));
        }
        let mut acts = self.forward(features);
        acts.pop().ok_or_else(|| MiaError::training("network has no layers"))
    }
}

/// Builds [`Mlp`]s whose seed is the configured seed offset by the build seed.
#[derive(Clone, Debug)]
pub struct MlpFactory {
    config: MlpConfig,
}

impl MlpFactory {
    /// Factory for networks with the given hyperparameters.
    pub fn new(config: MlpConfig) -> Self {
        Self { config }
    }

    /// Hyperparameters shared by every built network.
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }
}

impl ModelFactory for MlpFactory {
    type Model = Mlp;

    fn build(&self, seed: u64) -> Mlp {
        let seed = self.config.seed.wrapping_add(seed);
        Mlp::new(self.config.clone().with_seed(seed))
    }
}

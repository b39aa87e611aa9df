use mia::core::{InMemorySource, RawDataset, RawSplit, SyntheticSource};
use mia::estimators::test_utils::{memorizer, MemorizingClassifier};
use mia::estimators::{FitHistory, MlpConfig, MlpFactory};
use mia::{Classifier, Experiment, ExperimentConfig, FitConfig, MiaError, NoiseSweep};
use ndarray::{Array2, Array4, ArrayView2};
use std::cell::Cell;

fn toy_source() -> InMemorySource {
    let split = |offset: u8| RawSplit {
        images: Array4::from_shape_fn((4, 2, 2, 1), |(i, y, x, _)| {
            offset + (i * 4 + y * 2 + x) as u8
        }),
        labels: vec![0, 1, 0, 1],
    };
    InMemorySource::new(RawDataset {
        train: split(0),
        test: split(100),
        num_classes: 2,
    })
}

fn toy_config() -> ExperimentConfig {
    ExperimentConfig {
        target_epochs: 1,
        num_shadows: 1,
        attack_epochs: 1,
        shadow_dataset_size: 1,
        attack_test_size: 4,
        ..ExperimentConfig::default()
    }
}

/// Binary model that never claims membership.
#[derive(Default)]
struct NeverMember;

impl Classifier for NeverMember {
    fn fit(
        &mut self,
        _features: ArrayView2<'_, f32>,
        _labels: ArrayView2<'_, f32>,
        config: &FitConfig<'_>,
    ) -> mia::Result<FitHistory> {
        config.validate()?;
        Ok(FitHistory::default())
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> mia::Result<Array2<f32>> {
        Ok(Array2::zeros((features.nrows(), 1)))
    }
}

#[test]
fn memorizing_target_is_attackable() {
    let config = toy_config();
    let source = toy_source();
    let experiment = Experiment::new(&config, &source, memorizer, memorizer)
    .expect("valid config");

    let reports = experiment.run::<2>().expect("round succeeds");
    assert_eq!(reports.len(), 1);
    let m = &reports[0].summary.metrics;
    assert_eq!(m.counts.total(), 8);
    assert!(m.accuracy > 0.5, "accuracy {}", m.accuracy);
    for v in [m.accuracy, m.precision, m.recall, m.f1] {
        assert!((0.0..=1.0).contains(&v));
    }
    // Every non-member is recognised: the memorizer is uniform on unseen data.
    assert_eq!(m.counts.fp, 0);
}

#[test]
fn zero_positive_guesses_score_zero() {
    let config = toy_config();
    let source = toy_source();
    let experiment = Experiment::new(&config, &source, memorizer, |_: u64| NeverMember)
    .expect("valid config");

    let reports = experiment.run::<2>().expect("round succeeds");
    let m = &reports[0].summary.metrics;
    assert_eq!(m.precision, 0.0);
    assert_eq!(m.recall, 0.0);
    assert_eq!(m.f1, 0.0);
    assert!((m.accuracy - 0.5).abs() < 1e-12);
}

/// Memorizer that counts how often it is fitted.
struct CountingClassifier<'a> {
    fits: &'a Cell<usize>,
    inner: MemorizingClassifier,
}

impl Classifier for CountingClassifier<'_> {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        config: &FitConfig<'_>,
    ) -> mia::Result<FitHistory> {
        self.fits.set(self.fits.get() + 1);
        self.inner.fit(features, labels, config)
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> mia::Result<Array2<f32>> {
        self.inner.predict_proba(features)
    }
}

#[test]
fn shadow_pool_too_small_aborts_before_training() {
    let config = ExperimentConfig {
        shadow_dataset_size: 2,
        ..toy_config()
    };
    let source = toy_source();
    let fits = Cell::new(0);
    let counting = |_: u64| CountingClassifier {
        fits: &fits,
        inner: MemorizingClassifier::default(),
    };
    let experiment =
        Experiment::new(&config, &source, counting, memorizer).expect("valid config");
    assert!(matches!(
        experiment.run::<2>(),
        Err(MiaError::InvalidConfig { .. })
    ));
    assert_eq!(fits.get(), 0);
}

fn synthetic_source() -> SyntheticSource {
    SyntheticSource {
        train_size: 120,
        test_size: 120,
        height: 4,
        width: 4,
        channels: 3,
        num_classes: 10,
        jitter: 40.0,
        seed: 5,
    }
}

fn small_mlp_config() -> ExperimentConfig {
    ExperimentConfig {
        target_epochs: 2,
        num_shadows: 2,
        attack_epochs: 2,
        shadow_dataset_size: 40,
        attack_test_size: 50,
        batch_size: 16,
        ..ExperimentConfig::default()
    }
}

#[test]
fn rounds_are_reproducible() {
    let config = small_mlp_config().with_sweep(NoiseSweep {
        rounds: 2,
        step: 0.1,
    });
    let source = synthetic_source();
    let experiment = Experiment::new(
        &config,
        &source,
        MlpFactory::new(MlpConfig::target()),
        MlpFactory::new(MlpConfig::attack()),
    )
    .expect("valid config");

    let first = experiment.run_round::<10>(0, 0.0).expect("round");
    let second = experiment.run_round::<10>(0, 0.0).expect("round");
    assert_eq!(first.target_history, second.target_history);
    assert_eq!(first.summary.metrics, second.summary.metrics);
    assert_eq!(first.summary.auroc, second.summary.auroc);

    // A round rerun on its own matches the same round inside a sweep.
    let sweep = experiment.run::<10>().expect("sweep");
    let alone = experiment.run_round::<10>(1, sweep[1].noise).expect("round");
    assert_eq!(sweep[1].target_history, alone.target_history);
    assert_eq!(sweep[1].summary.metrics, alone.summary.metrics);
}

#[test]
fn noise_sweep_runs_every_round() {
    let config = small_mlp_config().with_sweep(NoiseSweep {
        rounds: 2,
        step: 0.1,
    });
    let source = synthetic_source();
    let experiment = Experiment::new(
        &config,
        &source,
        MlpFactory::new(MlpConfig::target()),
        MlpFactory::new(MlpConfig::attack()),
    )
    .expect("valid config");

    let reports = experiment.run::<10>().expect("sweep succeeds");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].noise, 0.0);
    assert!((reports[1].noise - 0.1).abs() < 1e-12);
    for report in &reports {
        let m = &report.summary.metrics;
        assert_eq!(m.counts.total(), 100);
        for v in [m.accuracy, m.precision, m.recall, m.f1] {
            assert!(v.is_finite() && (0.0..=1.0).contains(&v));
        }
        assert_eq!(report.target_history.loss.len(), 2);
        let (lo, hi) = report.summary.accuracy_interval;
        assert!(lo <= m.accuracy && m.accuracy <= hi);
    }
}

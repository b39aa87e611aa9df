//! The membership-inference experiment driver.

use std::fmt;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use mia_audit::{AuditSummary, Auditor};
use mia_core::{load_data, train_test_split, DatasetSource, MiaError, Result, SaltPepper, Split};
use mia_estimators::{
    prepare_attack_data, AttackInput, AttackModelBundle, Classifier, FitConfig, FitHistory,
    ModelFactory, ShadowModelBundle, Validation, MEMBERSHIP_THRESHOLD,
};

use crate::config::ExperimentConfig;

/// Steps of one experiment round, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Load and corrupt the dataset.
    LoadData,
    /// Fit the target model on the full training split.
    TrainTarget,
    /// Fit shadow models on the attacker's share of the test split.
    TrainShadows,
    /// Collect shadow outputs as attack training data.
    BuildAttackTrainingSet,
    /// Fit one membership classifier per class.
    TrainAttackModels,
    /// Run known members and non-members through the target.
    BuildEvalSet,
    /// Query the attack models.
    Predict,
    /// Compare guesses to ground truth.
    Score,
    /// Emit the round's metrics.
    Report,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 9] = [
        Stage::LoadData,
        Stage::TrainTarget,
        Stage::TrainShadows,
        Stage::BuildAttackTrainingSet,
        Stage::TrainAttackModels,
        Stage::BuildEvalSet,
        Stage::Predict,
        Stage::Score,
        Stage::Report,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadData => "load-data",
            Stage::TrainTarget => "train-target",
            Stage::TrainShadows => "train-shadows",
            Stage::BuildAttackTrainingSet => "build-attack-training-set",
            Stage::TrainAttackModels => "train-attack-models",
            Stage::BuildEvalSet => "build-eval-set",
            Stage::Predict => "predict",
            Stage::Score => "score",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

fn enter(round: usize, stage: Stage) {
    tracing::info!(round, stage = %stage, "entering stage");
}

/// Outcome of one noise round.
#[derive(Clone, Debug)]
pub struct RoundReport {
    /// Zero-based round index.
    pub round: usize,
    /// Salt-and-pepper probability used for the round.
    pub noise: f64,
    /// Attack metrics.
    pub summary: AuditSummary,
    /// Training curves of the target model.
    pub target_history: FitHistory,
    /// Wall-clock time of the round.
    pub elapsed: Duration,
}

impl fmt::Display for RoundReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.summary.metrics;
        writeln!(f, "round {}, noise strength = {}", self.round, self.noise)?;
        writeln!(f, "Acc: {:.3}", m.accuracy)?;
        writeln!(f, "Precision: {:.3}", m.precision)?;
        writeln!(f, "Recall: {:.3}", m.recall)?;
        writeln!(f, "F1: {:.3}", m.f1)?;
        write!(f, "time cost {:.3} s", self.elapsed.as_secs_f64())
    }
}

/// Known members (the first `k` training samples) and non-members (the first
/// `k` test samples) run through `target`.
pub fn build_eval_set<M, const C: usize>(
    target: &M,
    train: &Split,
    test: &Split,
    k: usize,
) -> Result<(Vec<AttackInput<C>>, Vec<bool>)>
where
    M: Classifier + ?Sized,
{
    let data_in = train.head(k)?;
    let data_out = test.head(k)?;
    let x_in = data_in.features()?;
    let x_out = data_out.features()?;
    prepare_attack_data::<M, C>(
        target,
        (x_in.view(), data_in.labels.view()),
        (x_out.view(), data_out.labels.view()),
    )
}

/// Runs target, shadow and attack training for each configured noise level.
///
/// `T` builds target and shadow models, `A` builds attack models. `C` is the
/// number of classes in the dataset.
pub struct Experiment<'a, S: ?Sized, T, A> {
    config: &'a ExperimentConfig,
    source: &'a S,
    target_factory: T,
    attack_factory: A,
    auditor: Auditor,
}

impl<'a, S, T, A> Experiment<'a, S, T, A>
where
    S: DatasetSource + ?Sized,
    T: ModelFactory,
    A: ModelFactory,
{
    /// Validate `config` and assemble an experiment.
    pub fn new(
        config: &'a ExperimentConfig,
        source: &'a S,
        target_factory: T,
        attack_factory: A,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            target_factory,
            attack_factory,
            auditor: Auditor::default(),
        })
    }

    /// Replace the auditor used for scoring.
    pub fn with_auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    /// Run every noise level in order. The first failure aborts the sweep.
    pub fn run<const C: usize>(&self) -> Result<Vec<RoundReport>> {
        self.config
            .noise_levels
            .iter()
            .enumerate()
            .map(|(round, &noise)| self.run_round::<C>(round, noise))
            .collect()
    }

    /// Run one round from scratch at the given noise level.
    pub fn run_round<const C: usize>(&self, round: usize, noise: f64) -> Result<RoundReport> {
        let cfg = self.config;
        let start = Instant::now();
        // Every model and draw of the round derives from this seed alone.
        let round_seed = cfg.seed.wrapping_add(round as u64);
        let mut rng = ChaCha8Rng::seed_from_u64(round_seed);
        let corruptor = SaltPepper::new(noise)?.with_granularity(cfg.granularity);
        tracing::info!(round, noise, "starting round");

        enter(round, Stage::LoadData);
        let (train, test) = load_data(self.source, &corruptor, &mut rng)?;
        if train.num_classes() != C {
            return Err(MiaError::config(format!(
                "dataset has {} classes, experiment expects {C}",
                train.num_classes()
            )));
        }
        let k = cfg.attack_test_size;
        if k > train.len() || k > test.len() {
            return Err(MiaError::config(format!(
                "attack_test_size {k} exceeds the train ({}) or test ({}) split",
                train.len(),
                test.len()
            )));
        }
        let attacker_holdout = (test.len() as f64 * cfg.attacker_test_fraction).ceil() as usize;
        let pool = test.len().saturating_sub(attacker_holdout);
        let needed = cfg.shadow_dataset_size.saturating_mul(2);
        if needed > pool {
            return Err(MiaError::config(format!(
                "each shadow model needs {needed} samples but the attacker pool has {pool}"
            )));
        }

        enter(round, Stage::TrainTarget);
        let x_train = train.features()?;
        let mut target = self.target_factory.build(round_seed);
        let target_fit = FitConfig::new(cfg.target_epochs)
            .with_batch_size(cfg.batch_size)
            .with_verbose(cfg.verbose)
            .with_validation(Validation::Split(cfg.target_validation_split));
        let target_history = target.fit(x_train.view(), train.labels.view(), &target_fit)?;
        drop(x_train);

        enter(round, Stage::TrainShadows);
        // The attacker's data never overlaps the target's training split.
        let (attacker_train, attacker_test) =
            train_test_split(&test, cfg.attacker_test_fraction, &mut rng)?;
        tracing::info!(
            attacker_train = attacker_train.len(),
            attacker_test = attacker_test.len(),
            "split attacker data"
        );
        let pool_x = attacker_train.features()?;
        let holdout_x = attacker_test.features()?;
        let shadow_fit = FitConfig::new(cfg.target_epochs)
            .with_batch_size(cfg.batch_size)
            .with_verbose(cfg.verbose)
            .with_validation(Validation::Data {
                features: holdout_x.view(),
                labels: attacker_test.labels.view(),
            });
        let mut shadows = ShadowModelBundle::new(
            |seed: u64| self.target_factory.build(seed),
            cfg.shadow_dataset_size,
            cfg.num_shadows,
        )
        .with_seed(round_seed.wrapping_add(1));
        shadows.fit(pool_x.view(), attacker_train.labels.view(), &shadow_fit)?;

        enter(round, Stage::BuildAttackTrainingSet);
        let shadow_data = shadows.transform::<C>(pool_x.view(), attacker_train.labels.view())?;
        drop(shadows);

        enter(round, Stage::TrainAttackModels);
        let attack_factory = |seed: u64| self.attack_factory.build(seed);
        let mut attack = AttackModelBundle::<_, C>::new(attack_factory)
            .with_seed(round_seed.wrapping_add(1 + cfg.num_shadows as u64));
        let attack_fit = FitConfig::new(cfg.attack_epochs)
            .with_batch_size(cfg.batch_size)
            .with_verbose(cfg.verbose);
        attack.fit(&shadow_data, &attack_fit)?;

        enter(round, Stage::BuildEvalSet);
        let (queries, truth) = build_eval_set::<_, C>(&target, &train, &test, k)?;

        enter(round, Stage::Predict);
        let scores = attack.predict_proba(&queries)?;
        let guesses: Vec<bool> = scores.iter().map(|&p| p > MEMBERSHIP_THRESHOLD).collect();

        enter(round, Stage::Score);
        let summary = self.auditor.audit(&guesses, &truth, Some(&scores))?;

        enter(round, Stage::Report);
        let report = RoundReport {
            round,
            noise,
            summary,
            target_history,
            elapsed: start.elapsed(),
        };
        let m = &report.summary.metrics;
        tracing::info!(
            round,
            noise,
            accuracy = m.accuracy,
            precision = m.precision,
            recall = m.recall,
            f1 = m.f1,
            epsilon_lower = report.summary.epsilon_lower,
            auroc = report.summary.auroc,
            elapsed_s = report.elapsed.as_secs_f64(),
            "round finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mia_audit::MembershipMetrics;
    use mia_core::{InMemorySource, RawDataset, RawSplit};
    use mia_estimators::test_utils::{memorizer, MemorizingClassifier};
    use ndarray::Array4;
    use std::collections::HashSet;

    fn distinct_split(n: usize, offset: usize) -> RawSplit {
        RawSplit {
            images: Array4::from_shape_fn((n, 1, 2, 1), |(i, _, x, _)| {
                ((offset + i) * 2 + x) as u8
            }),
            labels: (0..n).map(|i| (i % 2) as u8).collect(),
        }
    }

    fn source(n_train: usize, n_test: usize) -> InMemorySource {
        InMemorySource::new(RawDataset {
            train: distinct_split(n_train, 0),
            test: distinct_split(n_test, n_train),
            num_classes: 2,
        })
    }

    #[test]
    fn stages_run_in_documented_order() {
        assert_eq!(Stage::ALL[0], Stage::LoadData);
        assert_eq!(Stage::ALL[8], Stage::Report);
        assert_eq!(Stage::BuildEvalSet.to_string(), "build-eval-set");
    }

    #[test]
    fn eval_set_is_balanced_and_unique() {
        let src = source(10, 10);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (train, test) = load_data(&src, &SaltPepper::clean(), &mut rng).expect("load");
        let mut target = MemorizingClassifier::default();
        let x = train.features().expect("features");
        target
            .fit(x.view(), train.labels.view(), &FitConfig::new(1))
            .expect("fit");

        let (queries, truth) =
            build_eval_set::<_, 2>(&target, &train, &test, 4).expect("eval set");
        assert_eq!(queries.len(), 8);
        assert_eq!(truth.iter().filter(|&&t| t).count(), 4);
        assert_eq!(truth.iter().filter(|&&t| !t).count(), 4);
        assert!(truth[..4].iter().all(|&t| t));

        let in_rows = train.head(4).expect("head").features().expect("features");
        let unique: HashSet<Vec<u32>> = in_rows
            .rows()
            .into_iter()
            .map(|r| r.iter().map(|v| v.to_bits()).collect())
            .collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn eval_set_larger_than_split_is_rejected() {
        let config = ExperimentConfig {
            attack_test_size: 50,
            shadow_dataset_size: 1,
            num_shadows: 1,
            target_epochs: 1,
            attack_epochs: 1,
            ..ExperimentConfig::default()
        };
        let src = source(8, 8);
        let exp =
            Experiment::new(&config, &src, memorizer, memorizer).expect("valid config");
        assert!(matches!(
            exp.run::<2>(),
            Err(MiaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn class_count_mismatch_is_rejected() {
        let config = ExperimentConfig {
            attack_test_size: 2,
            shadow_dataset_size: 1,
            ..ExperimentConfig::default()
        };
        let src = source(8, 8);
        let exp =
            Experiment::new(&config, &src, memorizer, memorizer).expect("valid config");
        assert!(exp.run_round::<10>(0, 0.0).is_err());
    }

    #[test]
    fn invalid_config_fails_before_loading() {
        let config = ExperimentConfig {
            num_shadows: 0,
            ..ExperimentConfig::default()
        };
        let src = source(4, 4);
        let result = Experiment::new(&config, &src, memorizer, memorizer);
        assert!(result.is_err());
    }

    #[test]
    fn report_prints_four_metrics() {
        let report = RoundReport {
            round: 0,
            noise: 0.0,
            summary: AuditSummary {
                metrics: MembershipMetrics::default(),
                epsilon_lower: 0.0,
                auroc: None,
                accuracy_interval: (0.0, 1.0),
            },
            target_history: FitHistory::default(),
            elapsed: Duration::from_millis(1500),
        };
        let text = report.to_string();
        for key in ["Acc: 0.000", "Precision:", "Recall:", "F1:", "time cost 1.500 s"] {
            assert!(text.contains(key), "missing {key} in {text}");
        }
    }
}

//! Command-line entry point for the membership-inference experiment.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use mia::{
    Cifar10Dir, DatasetSource, Experiment, ExperimentConfig, Granularity, MlpConfig, MlpFactory,
    NoiseSweep, SyntheticSource, DEFAULT_ATTACK_EPOCHS, DEFAULT_ATTACK_TEST_SIZE,
    DEFAULT_NOISE_STEP, DEFAULT_NUM_SHADOWS, DEFAULT_SHADOW_DATASET_SIZE, DEFAULT_TARGET_EPOCHS,
    NUM_CLASSES,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GranularityArg {
    /// One decision per image row
    Row,
    /// One decision per pixel channel
    Element,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Row => Granularity::Row,
            GranularityArg::Element => Granularity::Element,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "mia")]
#[command(about = "Membership inference attack against an image classifier", long_about = None)]
struct Cli {
    /// Number of epochs to train target and shadow models
    #[arg(long, default_value_t = DEFAULT_TARGET_EPOCHS)]
    target_epochs: usize,

    /// Number of shadow models
    #[arg(long, default_value_t = DEFAULT_NUM_SHADOWS)]
    num_shadows: usize,

    /// Number of epochs to train attack models
    #[arg(long, default_value_t = DEFAULT_ATTACK_EPOCHS)]
    attack_epochs: usize,

    /// Directory with the CIFAR-10 binary batches
    #[arg(long, default_value = "./cifar-10-batches-bin")]
    data_dir: PathBuf,

    /// Use a small synthetic dataset instead of CIFAR-10
    #[arg(long)]
    synthetic: bool,

    /// Number of noise rounds; round r uses strength r * noise-step
    #[arg(long, default_value_t = 1)]
    noise_rounds: usize,

    /// Noise strength increment between rounds
    #[arg(long, default_value_t = DEFAULT_NOISE_STEP)]
    noise_step: f64,

    /// Corruption granularity
    #[arg(long, value_enum, default_value_t = GranularityArg::Row)]
    granularity: GranularityArg,

    /// Training-set size of every shadow model
    #[arg(long, default_value_t = DEFAULT_SHADOW_DATASET_SIZE)]
    shadow_dataset_size: usize,

    /// Number of in and of out samples used to evaluate the attack
    #[arg(long, default_value_t = DEFAULT_ATTACK_TEST_SIZE)]
    attack_test_size: usize,

    /// Mini-batch size
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Base random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Log every training epoch
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> ExperimentConfig {
        ExperimentConfig {
            target_epochs: self.target_epochs,
            num_shadows: self.num_shadows,
            attack_epochs: self.attack_epochs,
            shadow_dataset_size: self.shadow_dataset_size,
            attack_test_size: self.attack_test_size,
            granularity: self.granularity.into(),
            batch_size: self.batch_size,
            seed: self.seed,
            verbose: self.verbose,
            ..ExperimentConfig::default()
        }
        .with_sweep(NoiseSweep {
            rounds: self.noise_rounds,
            step: self.noise_step,
        })
    }

    fn source(&self) -> Box<dyn DatasetSource> {
        if self.synthetic {
            Box::new(SyntheticSource {
                seed: self.seed,
                ..SyntheticSource::default()
            })
        } else {
            Box::new(Cifar10Dir::new(self.data_dir.clone()))
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let source = cli.source();

    let target_factory = MlpFactory::new(MlpConfig::target());
    let attack_factory = MlpFactory::new(MlpConfig::attack());
    let experiment = Experiment::new(&config, source.as_ref(), target_factory, attack_factory)
        .context("invalid experiment configuration")?;

    let reports = experiment
        .run::<NUM_CLASSES>()
        .with_context(|| format!("experiment on {} failed", source.name()))?;
    for report in &reports {
        println!("{report}");
    }
    Ok(())
}

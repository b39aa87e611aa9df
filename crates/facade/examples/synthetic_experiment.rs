use mia::{
    Experiment, ExperimentConfig, MlpConfig, MlpFactory, NoiseSweep, SyntheticSource,
};

fn main() -> mia::Result<()> {
    let source = SyntheticSource {
        train_size: 600,
        test_size: 600,
        ..SyntheticSource::default()
    };
    let config = ExperimentConfig {
        target_epochs: 8,
        num_shadows: 3,
        attack_epochs: 6,
        shadow_dataset_size: 200,
        attack_test_size: 200,
        batch_size: 32,
        ..ExperimentConfig::default()
    }
    .with_sweep(NoiseSweep {
        rounds: 3,
        step: 0.1,
    });

    let experiment = Experiment::new(
        &config,
        &source,
        MlpFactory::new(MlpConfig::target()),
        MlpFactory::new(MlpConfig::attack()),
    )?;
    for report in experiment.run::<10>()? {
        println!("{report}");
        println!(
            "  epsilon >= {:.3}, auroc = {:?}",
            report.summary.epsilon_lower, report.summary.auroc
        );
    }
    Ok(())
}

use mia::core::NoiseKind;
use mia::{Granularity, SaltPepper};
use ndarray::Array4;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn main() -> mia::Result<()> {
    let images = Array4::from_elem((64, 8, 8, 3), 128.0_f32);
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for granularity in [Granularity::Row, Granularity::Element] {
        for p in [0.0, 0.05, 0.2, 0.45] {
            let corruptor = SaltPepper::new(p)?.with_granularity(granularity);
            let (_, report) = corruptor.corrupt_with_report(images.view(), &mut rng);
            println!(
                "{granularity:?} p={p:.2}: pepper={} salt={} kept={} corrupted={:.3}",
                report.pepper,
                report.salt,
                report.kept,
                report.corrupted_fraction()
            );
        }
    }

    println!("draw 0.01 at p=0.1 -> {:?}", NoiseKind::classify(0.01, 0.1));
    println!("draw 0.95 at p=0.1 -> {:?}", NoiseKind::classify(0.95, 0.1));
    Ok(())
}

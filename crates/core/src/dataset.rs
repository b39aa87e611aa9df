//! Image-classification datasets and the noisy loader.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array4, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{MiaError, Result};
use crate::noise::SaltPepper;
use crate::tensor::{
    argmax_rows, check_same_len, flatten_images, one_hot, Features, Images, Labels, RawImages,
};

/// Number of classes in CIFAR-10.
pub const NUM_CLASSES: usize = 10;
/// CIFAR-10 image height.
pub const HEIGHT: usize = 32;
/// CIFAR-10 image width.
pub const WIDTH: usize = 32;
/// CIFAR-10 channel count.
pub const CHANNELS: usize = 3;

const PIXELS: usize = HEIGHT * WIDTH * CHANNELS;
const RECORD_BYTES: usize = 1 + PIXELS;
const TRAIN_FILES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_FILE: &str = "test_batch.bin";

/// Images and integer labels as delivered by a source.
#[derive(Clone, Debug)]
pub struct RawSplit {
    /// `[sample, height, width, channel]` pixels.
    pub images: Array4<u8>,
    /// Integer class id per sample.
    pub labels: Vec<u8>,
}

impl RawSplit {
    /// Number of images.
    pub fn len(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    /// Whether the split holds no images.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Train and test splits of a classification dataset.
#[derive(Clone, Debug)]
pub struct RawDataset {
    /// Training split.
    pub train: RawSplit,
    /// Test split.
    pub test: RawSplit,
    /// Number of classes.
    pub num_classes: usize,
}

/// Something that can produce a [`RawDataset`].
pub trait DatasetSource {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Load the dataset.
    fn load(&self) -> Result<RawDataset>;
}

/// CIFAR-10 in its binary distribution layout.
#[derive(Clone, Debug)]
pub struct Cifar10Dir {
    root: PathBuf,
}

impl Cifar10Dir {
    /// Point at a `cifar-10-batches-bin` directory.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the batch files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_files(&self, files: &[&str]) -> Result<RawSplit> {
        let mut labels = Vec::new();
        let mut pixels = Vec::new();
        for file in files {
            let path = self.root.join(file);
            let bytes = fs::read(&path)
                .map_err(|e| MiaError::dataset(format!("{}: {e}", path.display())))?;
            decode_records(&bytes, &path, &mut labels, &mut pixels)?;
        }
        let images = Array4::from_shape_vec((labels.len(), HEIGHT, WIDTH, CHANNELS), pixels)
            .map_err(|e| MiaError::dataset(e.to_string()))?;
        Ok(RawSplit { images, labels })
    }
}

impl DatasetSource for Cifar10Dir {
    fn name(&self) -> &str {
        "cifar10"
    }

    fn load(&self) -> Result<RawDataset> {
        let train = self.read_files(&TRAIN_FILES)?;
        let test = self.read_files(&[TEST_FILE])?;
        Ok(RawDataset {
            train,
            test,
            num_classes: NUM_CLASSES,
        })
    }
}

/// Decode binary records (label byte, then R, G and B planes) into HWC order.
fn decode_records(
    bytes: &[u8],
    path: &Path,
    labels: &mut Vec<u8>,
    pixels: &mut Vec<u8>,
) -> Result<()> {
    if bytes.is_empty() || bytes.len() % RECORD_BYTES != 0 {
        return Err(MiaError::dataset(format!(
            "{}: {} bytes is not a whole number of {RECORD_BYTES}-byte records",
            path.display(),
            bytes.len()
        )));
    }
    let plane = HEIGHT * WIDTH;
    for record in bytes.chunks_exact(RECORD_BYTES) {
        labels.push(record[0]);
        let planes = &record[1..];
        for p in 0..plane {
            for c in 0..CHANNELS {
                pixels.push(planes[c * plane + p]);
            }
        }
    }
    Ok(())
}

/// A dataset already resident in memory.
#[derive(Clone, Debug)]
pub struct InMemorySource {
    data: RawDataset,
}

impl InMemorySource {
    /// Wrap an existing dataset.
    pub fn new(data: RawDataset) -> Self {
        Self { data }
    }
}

impl DatasetSource for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn load(&self) -> Result<RawDataset> {
        Ok(self.data.clone())
    }
}

/// Class-conditional random images for smoke runs without the real dataset.
///
/// Each class has its own mean intensity; pixels add uniform jitter around it.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    /// Training images.
    pub train_size: usize,
    /// Test images.
    pub test_size: usize,
    /// Image height.
    pub height: usize,
    /// Image width.
    pub width: usize,
    /// Image channels.
    pub channels: usize,
    /// Number of classes.
    pub num_classes: usize,
    /// Maximum absolute jitter around the class mean.
    pub jitter: f32,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self {
            train_size: 10_000,
            test_size: 10_000,
            height: 8,
            width: 8,
            channels: CHANNELS,
            num_classes: NUM_CLASSES,
            jitter: 60.0,
            seed: 0,
        }
    }
}

impl SyntheticSource {
    fn generate<R: Rng>(&self, n: usize, rng: &mut R) -> Result<RawSplit> {
        let per_image = self.height * self.width * self.channels;
        let step = 255.0 / self.num_classes as f32;
        let mut labels = Vec::with_capacity(n);
        let mut pixels = Vec::with_capacity(n * per_image);
        for _ in 0..n {
            let class = rng.gen_range(0..self.num_classes);
            let mean = (class as f32 + 0.5) * step;
            labels.push(class as u8);
            for _ in 0..per_image {
                let v = mean + rng.gen_range(-self.jitter..=self.jitter);
                pixels.push(v.clamp(0.0, 255.0) as u8);
            }
        }
        let images = Array4::from_shape_vec((n, self.height, self.width, self.channels), pixels)
            .map_err(|e| MiaError::config(e.to_string()))?;
        Ok(RawSplit { images, labels })
    }
}

impl DatasetSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn load(&self) -> Result<RawDataset> {
        if self.num_classes == 0 || self.num_classes > u8::MAX as usize + 1 {
            return Err(MiaError::config("synthetic num_classes must be in 1..=256"));
        }
        if self.jitter < 0.0 || !self.jitter.is_finite() {
            return Err(MiaError::config("synthetic jitter must be non-negative"));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let train = self.generate(self.train_size, &mut rng)?;
        let test = self.generate(self.test_size, &mut rng)?;
        Ok(RawDataset {
            train,
            test,
            num_classes: self.num_classes,
        })
    }
}

/// Noised images with one-hot labels.
#[derive(Clone, Debug, PartialEq)]
pub struct Split {
    /// `[sample, height, width, channel]` 8-bit pixels.
    pub images: Images,
    /// One-hot labels.
    pub labels: Labels,
}

impl Split {
    /// Pair images with labels, checking the sample counts agree.
    pub fn new(images: Images, labels: Labels) -> Result<Self> {
        check_same_len("split", images.len_of(Axis(0)), labels.nrows())?;
        Ok(Self { images, labels })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.labels.nrows()
    }

    /// Whether the split is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of the one-hot labels.
    pub fn num_classes(&self) -> usize {
        self.labels.ncols()
    }

    /// Flattened, `[0, 1]`-scaled model inputs.
    pub fn features(&self) -> Result<Features> {
        flatten_images(&self.images)
    }

    /// Integer class id of every sample.
    pub fn class_ids(&self) -> Vec<usize> {
        argmax_rows(self.labels.view())
    }

    /// The first `k` samples.
    pub fn head(&self, k: usize) -> Result<Self> {
        if k > self.len() {
            return Err(MiaError::config(format!(
                "requested {k} samples from a split of {}",
                self.len()
            )));
        }
        let indices: Vec<usize> = (0..k).collect();
        Ok(self.select(&indices))
    }

    /// Gather the given rows. Indices must be in bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            images: self.images.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }
}

/// Load a dataset, corrupt both splits with `noise` and one-hot encode labels.
pub fn load_data<S, R>(source: &S, noise: &SaltPepper, rng: &mut R) -> Result<(Split, Split)>
where
    S: DatasetSource + ?Sized,
    R: Rng + ?Sized,
{
    let raw = source.load()?;
    let train = prepare_split("train", &raw.train, raw.num_classes, noise, rng)?;
    let test = prepare_split("test", &raw.test, raw.num_classes, noise, rng)?;
    tracing::info!(
        source = source.name(),
        train = train.len(),
        test = test.len(),
        noise = noise.prob(),
        "loaded dataset"
    );
    Ok((train, test))
}

fn prepare_split<R: Rng + ?Sized>(
    what: &str,
    raw: &RawSplit,
    num_classes: usize,
    noise: &SaltPepper,
    rng: &mut R,
) -> Result<Split> {
    check_same_len(what, raw.len(), raw.labels.len())?;
    let float: RawImages = raw.images.mapv(f32::from);
    let images = noise.corrupt(float.view(), rng);
    let labels = one_hot(&raw.labels, num_classes)?;
    Split::new(images, labels)
}

/// Shuffle and partition a split; the test side gets `ceil(n * test_fraction)` samples.
pub fn train_test_split<R: Rng + ?Sized>(
    split: &Split,
    test_fraction: f64,
    rng: &mut R,
) -> Result<(Split, Split)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(MiaError::config(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n = split.len();
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(MiaError::config(format!(
            "cannot split {n} samples with test fraction {test_fraction}"
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((split.select(train_idx), split.select(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tiny_raw(n_train: usize, n_test: usize) -> RawDataset {
        let make = |n: usize, offset: u8| RawSplit {
            images: Array4::from_shape_fn((n, 2, 2, 1), |(i, y, x, _)| {
                offset.wrapping_add((i * 4 + y * 2 + x) as u8)
            }),
            labels: (0..n).map(|i| (i % 2) as u8).collect(),
        };
        RawDataset {
            train: make(n_train, 0),
            test: make(n_test, 100),
            num_classes: 2,
        }
    }

    #[test]
    fn test_decode_record_transposes_planes() {
        let mut record = vec![7u8];
        for c in 0..CHANNELS {
            record.extend(std::iter::repeat(c as u8 + 1).take(HEIGHT * WIDTH));
        }
        let mut labels = Vec::new();
        let mut pixels = Vec::new();
        decode_records(&record, Path::new("mem"), &mut labels, &mut pixels).expect("decode");
        assert_eq!(labels, vec![7]);
        assert_eq!(&pixels[..6], &[1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_decode_rejects_truncated_file() {
        let mut labels = Vec::new();
        let mut pixels = Vec::new();
        let err = decode_records(&[0u8; 10], Path::new("mem"), &mut labels, &mut pixels);
        assert!(matches!(err, Err(MiaError::DatasetUnavailable { .. })));
    }

    #[test]
    fn test_missing_directory_is_unavailable() {
        let src = Cifar10Dir::new("/definitely/not/here");
        assert!(matches!(src.load(), Err(MiaError::DatasetUnavailable { .. })));
    }

    #[test]
    fn test_cifar_dir_reads_batches() {
        let dir = std::env::temp_dir().join(format!("mia-cifar-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let mut record = vec![3u8];
        record.extend(std::iter::repeat(9u8).take(PIXELS));
        for file in TRAIN_FILES.iter().chain(std::iter::once(&TEST_FILE)) {
            let mut f = fs::File::create(dir.join(file)).expect("create");
            f.write_all(&record).expect("write");
        }
        let data = Cifar10Dir::new(&dir).load().expect("load");
        fs::remove_dir_all(&dir).ok();
        assert!(!data.train.is_empty());
        assert_eq!(data.train.len(), 5);
        assert_eq!(data.test.len(), 1);
        assert_eq!(data.train.images.dim(), (5, HEIGHT, WIDTH, CHANNELS));
        assert!(data.test.labels.iter().all(|&l| l == 3));
    }

    #[test]
    fn test_load_data_one_hot_and_clean() {
        let src = InMemorySource::new(tiny_raw(4, 3));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (train, test) = load_data(&src, &SaltPepper::clean(), &mut rng).expect("load");
        assert_eq!(train.len(), 4);
        assert_eq!(test.len(), 3);
        assert_eq!(train.class_ids(), vec![0, 1, 0, 1]);
        assert_eq!(test.images[[0, 0, 0, 0]], 100);
        assert_eq!(train.images[[1, 1, 1, 0]], 7);
    }

    #[test]
    fn test_load_data_rejects_label_mismatch() {
        let mut raw = tiny_raw(4, 3);
        raw.train.labels.pop();
        let src = InMemorySource::new(raw);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            load_data(&src, &SaltPepper::clean(), &mut rng),
            Err(MiaError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_train_test_split_sizes() {
        let src = InMemorySource::new(tiny_raw(10, 2));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (train, _) = load_data(&src, &SaltPepper::clean(), &mut rng).expect("load");
        let (a, b) = train_test_split(&train, 0.1, &mut rng).expect("split");
        assert_eq!(a.len(), 9);
        assert_eq!(b.len(), 1);
        assert!(train_test_split(&train, 1.0, &mut rng).is_err());
    }

    #[test]
    fn test_head_bounds() {
        let src = InMemorySource::new(tiny_raw(4, 3));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (train, _) = load_data(&src, &SaltPepper::clean(), &mut rng).expect("load");
        assert_eq!(train.head(2).expect("head").len(), 2);
        assert!(matches!(train.head(5), Err(MiaError::InvalidConfig { .. })));
    }

    #[test]
    fn test_synthetic_source_is_seeded() {
        let src = SyntheticSource {
            train_size: 20,
            test_size: 10,
            ..SyntheticSource::default()
        };
        let a = src.load().expect("load");
        let b = src.load().expect("load");
        assert!(!a.train.is_empty());
        let empty = SyntheticSource {
            test_size: 0,
            ..src.clone()
        };
        assert!(empty.load().expect("load").test.is_empty());
        assert_eq!(a.train.images, b.train.images);
        assert_eq!(a.test.labels, b.test.labels);
        assert!(a.train.labels.iter().all(|&l| (l as usize) < NUM_CLASSES));
    }
}

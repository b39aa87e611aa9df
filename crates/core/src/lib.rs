//! Core building blocks for membership-inference experiments.
//!
//! This crate provides dataset loading, tensor helpers and the
//! salt-and-pepper corruption applied to images before training.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dataset;
pub mod error;
pub mod noise;
pub mod tensor;

pub use dataset::{
    load_data, train_test_split, Cifar10Dir, DatasetSource, InMemorySource, RawDataset, RawSplit,
    Split, SyntheticSource, CHANNELS, HEIGHT, NUM_CLASSES, WIDTH,
};
pub use error::{MiaError, Result};
pub use noise::{validate_probability, Granularity, NoiseKind, NoiseReport, SaltPepper};
pub use tensor::{
    argmax_rows, check_same_len, flatten_images, one_hot, Features, Images, Labels, RawImages,
};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{
        argmax_rows, load_data, one_hot, train_test_split, Cifar10Dir, DatasetSource, Features,
        Granularity, Images, InMemorySource, Labels, MiaError, Result, SaltPepper, Split,
        SyntheticSource,
    };
}

//! Tensor types and low-level operations.

use ndarray::{Array2, Array4, ArrayView2, Axis};

use crate::error::{MiaError, Result};

/// Image batch after corruption: `[sample, height, width, channel]`, 8-bit values.
pub type Images = Array4<u8>;

/// Image batch before corruption, in floating point.
pub type RawImages = Array4<f32>;

/// One-hot encoded labels: `[sample, class]`.
pub type Labels = Array2<f32>;

/// Flattened model inputs: `[sample, feature]`.
pub type Features = Array2<f32>;

/// Encode integer class ids as one-hot rows.
pub fn one_hot(labels: &[u8], num_classes: usize) -> Result<Labels> {
    if num_classes == 0 {
        return Err(MiaError::config("num_classes must be positive"));
    }
    let mut out = Array2::zeros((labels.len(), num_classes));
    for (row, &label) in labels.iter().enumerate() {
        let class = label as usize;
        if class >= num_classes {
            return Err(MiaError::shape(format!(
                "label {class} at row {row} is outside 0..{num_classes}"
            )));
        }
        out[[row, class]] = 1.0;
    }
    Ok(out)
}

/// Index of the largest entry in every row. Ties resolve to the first index.
pub fn argmax_rows(values: ArrayView2<'_, f32>) -> Vec<usize> {
    values
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0usize;
            let mut best_val = f32::NEG_INFINITY;
            for (i, &v) in row.iter().enumerate() {
                if v > best_val {
                    best = i;
                    best_val = v;
                }
            }
            best
        })
        .collect()
}

/// Flatten each image into one row and scale pixel values into `[0, 1]`.
pub fn flatten_images(images: &Images) -> Result<Features> {
    let n = images.len_of(Axis(0));
    let dim = if n == 0 { 0 } else { images.len() / n };
    let data = images.iter().map(|&v| v as f32 / 255.0).collect();
    Array2::from_shape_vec((n, dim), data).map_err(|e| MiaError::shape(e.to_string()))
}

/// Fail with a shape mismatch unless both counts agree.
pub fn check_same_len(what: &str, left: usize, right: usize) -> Result<()> {
    if left != right {
        return Err(MiaError::shape(format!(
            "{what}: {left} samples vs {right} labels"
        )));
    }
    Ok(())
}

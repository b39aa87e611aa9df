//! Test utilities for estimator pipelines.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2};

use mia_core::{check_same_len, MiaError, Result};

use crate::model::{Classifier, FitConfig, FitHistory};

/// Classifier that stores every training row verbatim.
///
/// Seen rows predict their stored label exactly; unseen rows predict the
/// uniform distribution (0.5 for binary tasks).
#[derive(Clone, Debug, Default)]
pub struct MemorizingClassifier {
    table: HashMap<Vec<u32>, Vec<f32>>,
    inputs: Option<usize>,
    outputs: usize,
}

fn key(row: ArrayView1<'_, f32>) -> Vec<u32> {
    row.iter().map(|v| v.to_bits()).collect()
}

/// Model factory for [`MemorizingClassifier`]; memorization ignores the seed.
pub fn memorizer(_seed: u64) -> MemorizingClassifier {
    MemorizingClassifier::default()
}

impl MemorizingClassifier {
    /// Number of distinct memorized rows.
    pub fn memorized(&self) -> usize {
        self.table.len()
    }
}

impl Classifier for MemorizingClassifier {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f32>,
        labels: ArrayView2<'_, f32>,
        config: &FitConfig<'_>,
    ) -> Result<FitHistory> {
        config.validate()?;
        check_same_len("fit", features.nrows(), labels.nrows())?;
        if features.nrows() == 0 {
            return Err(MiaError::training("no training samples"));
        }
        self.inputs = Some(features.ncols());
        self.outputs = labels.ncols();
        for (x, y) in features.rows().into_iter().zip(labels.rows()) {
            self.table.insert(key(x), y.to_vec());
        }
        Ok(FitHistory {
            loss: vec![0.0; config.epochs],
            accuracy: vec![1.0; config.epochs],
            ..FitHistory::default()
        })
    }

    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let Some(inputs) = self.inputs else {
            return Err(MiaError::training("model has not been fitted"));
        };
        if features.ncols() != inputs {
            return Err(MiaError::shape(format!(
                "model expects {inputs} features, got {}",
                features.ncols()
            )));
        }
        let unseen = if self.outputs == 1 {
            0.5
        } else {
            1.0 / self.outputs as f32
        };
        let mut out = Array2::from_elem((features.nrows(), self.outputs), unseen);
        for (mut dst, x) in out.rows_mut().into_iter().zip(features.rows()) {
            if let Some(y) = self.table.get(&key(x)) {
                for (d, &v) in dst.iter_mut().zip(y) {
                    *d = v;
                }
            }
        }
        Ok(out)
    }
}

//! Attack-model inputs and the records produced by shadow models.

use ndarray::{Array2, ArrayView2};

use mia_core::{argmax_rows, check_same_len, MiaError, Result};

use crate::model::Classifier;

/// Model output over a fixed number of classes `C`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbabilityVector<const C: usize>([f32; C]);

impl<const C: usize> ProbabilityVector<C> {
    /// Wrap an array of scores.
    pub fn new(values: [f32; C]) -> Self {
        Self(values)
    }

    /// Copy scores out of a slice of exactly `C` values.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        if values.len() != C {
            return Err(MiaError::shape(format!(
                "expected {C} class scores, got {}",
                values.len()
            )));
        }
        let mut out = [0.0; C];
        out.copy_from_slice(values);
        Ok(Self(out))
    }

    /// Scores in class order.
    pub fn as_array(&self) -> &[f32; C] {
        &self.0
    }

    /// Sum of the scores.
    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }
}

/// A query to the attack: the sample's true class and the model's output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttackInput<const C: usize> {
    /// True class of the sample.
    pub class: usize,
    /// Probability vector produced by the attacked model.
    pub probs: ProbabilityVector<C>,
}

/// One row of attack training data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowRecord<const C: usize> {
    /// True class of the sample.
    pub class: usize,
    /// Probability vector produced by the shadow model.
    pub probs: ProbabilityVector<C>,
    /// Whether the sample was in the shadow model's training set.
    pub member: bool,
}

impl<const C: usize> ShadowRecord<C> {
    /// The record without its membership label.
    pub fn input(&self) -> AttackInput<C> {
        AttackInput {
            class: self.class,
            probs: self.probs,
        }
    }
}

/// Attack training data collected from every shadow model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShadowDataset<const C: usize> {
    records: Vec<ShadowRecord<C>>,
}

impl<const C: usize> ShadowDataset<C> {
    /// Dataset from records.
    pub fn new(records: Vec<ShadowRecord<C>>) -> Self {
        Self { records }
    }

    /// Build from parallel inputs and membership labels.
    pub fn from_parts(inputs: Vec<AttackInput<C>>, members: Vec<bool>) -> Result<Self> {
        check_same_len("shadow records", inputs.len(), members.len())?;
        Ok(Self {
            records: inputs
                .into_iter()
                .zip(members)
                .map(|(input, member)| ShadowRecord {
                    class: input.class,
                    probs: input.probs,
                    member,
                })
                .collect(),
        })
    }

    /// Append another dataset.
    pub fn extend(&mut self, other: Self) {
        self.records.extend(other.records);
    }

    /// All records.
    pub fn records(&self) -> &[ShadowRecord<C>] {
        &self.records
    }

    /// Records whose true class is `class`.
    pub fn by_class(&self, class: usize) -> impl Iterator<Item = &ShadowRecord<C>> + '_ {
        self.records.iter().filter(move |r| r.class == class)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records labelled as members.
    pub fn members(&self) -> usize {
        self.records.iter().filter(|r| r.member).count()
    }
}

/// Run `model` over known members and non-members and pair every output with
/// the sample's true class.
///
/// Members come first and are labelled `true`; non-members follow, labelled
/// `false`. `data_in` and `data_out` are `(features, one-hot labels)`.
pub fn prepare_attack_data<M, const C: usize>(
    model: &M,
    data_in: (ArrayView2<'_, f32>, ArrayView2<'_, f32>),
    data_out: (ArrayView2<'_, f32>, ArrayView2<'_, f32>),
) -> Result<(Vec<AttackInput<C>>, Vec<bool>)>
where
    M: Classifier + ?Sized,
{
    let n_total = data_in.0.nrows() + data_out.0.nrows();
    let mut inputs = Vec::with_capacity(n_total);
    let mut members = Vec::with_capacity(n_total);
    let halves = [
        ((data_in.0.view(), data_in.1.view()), true),
        ((data_out.0.view(), data_out.1.view()), false),
    ];
    for ((features, labels), member) in halves {
        check_same_len("attack data", features.nrows(), labels.nrows())?;
        if labels.ncols() != C {
            return Err(MiaError::shape(format!(
                "labels have {} classes, expected {C}",
                labels.ncols()
            )));
        }
        let probs = model.predict_proba(features)?;
        collect_inputs(&probs, labels, &mut inputs)?;
        members.extend(std::iter::repeat(member).take(features.nrows()));
    }
    Ok((inputs, members))
}

fn collect_inputs<const C: usize>(
    probs: &Array2<f32>,
    labels: ArrayView2<'_, f32>,
    out: &mut Vec<AttackInput<C>>,
) -> Result<()> {
    check_same_len("model output", probs.nrows(), labels.nrows())?;
    for (row, class) in probs.rows().into_iter().zip(argmax_rows(labels)) {
        let probs = match row.as_slice() {
            Some(slice) => ProbabilityVector::from_slice(slice)?,
            None => ProbabilityVector::from_slice(&row.to_vec())?,
        };
        out.push(AttackInput { class, probs });
    }
    Ok(())
}

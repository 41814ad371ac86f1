//! Parameter and label-distribution containers shared by the EM steps

use super::params::TieBreak;
use rand::Rng;
use serde::Serialize;

/// Per-item distribution over true classes, `[item][class]`
///
/// Rows are either soft (sum to 1) or one-hot, depending on the phase that
/// produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDistribution {
    classes: usize,
    values: Vec<f64>,
}

impl LabelDistribution {
    pub fn zeros(items: usize, classes: usize) -> Self {
        Self {
            classes,
            values: vec![0.0; items * classes],
        }
    }

    pub fn items(&self) -> usize {
        if self.classes == 0 {
            0
        } else {
            self.values.len() / self.classes
        }
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    #[inline]
    pub fn row(&self, item: usize) -> &[f64] {
        &self.values[item * self.classes..(item + 1) * self.classes]
    }

    #[inline]
    pub fn row_mut(&mut self, item: usize) -> &mut [f64] {
        &mut self.values[item * self.classes..(item + 1) * self.classes]
    }

    /// Replace an item's row with a one-hot vector at `class`
    pub fn set_one_hot(&mut self, item: usize, class: usize) {
        let row = self.row_mut(item);
        row.fill(0.0);
        row[class] = 1.0;
    }

    /// Arg-max class of every item
    pub fn hard_labels<R: Rng + ?Sized>(&self, tie_break: TieBreak, rng: &mut R) -> Vec<usize> {
        (0..self.items())
            .map(|item| argmax(self.row(item), tie_break, rng))
            .collect()
    }
}

/// Confusion matrices, `[annotator][true class][assigned class]`
///
/// Each `(annotator, true class)` row sums to 1, or is all zero when the
/// annotator received no weight toward that true class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRates {
    annotators: usize,
    classes: usize,
    values: Vec<f64>,
}

impl ErrorRates {
    pub fn zeros(annotators: usize, classes: usize) -> Self {
        Self {
            annotators,
            classes,
            values: vec![0.0; annotators * classes * classes],
        }
    }

    pub fn annotators(&self) -> usize {
        self.annotators
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    #[inline]
    pub fn get(&self, annotator: usize, true_class: usize, assigned: usize) -> f64 {
        self.values[(annotator * self.classes + true_class) * self.classes + assigned]
    }

    #[inline]
    pub fn row(&self, annotator: usize, true_class: usize) -> &[f64] {
        let start = (annotator * self.classes + true_class) * self.classes;
        &self.values[start..start + self.classes]
    }

    #[inline]
    pub fn row_mut(&mut self, annotator: usize, true_class: usize) -> &mut [f64] {
        let start = (annotator * self.classes + true_class) * self.classes;
        &mut self.values[start..start + self.classes]
    }

    /// `Σ |self - other|` over every cell
    pub fn total_abs_diff(&self, other: &ErrorRates) -> f64 {
        self.values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b).abs())
            .sum()
    }

    /// Confusion matrix of one annotator as nested rows
    pub fn matrix(&self, annotator: usize) -> Vec<Vec<f64>> {
        (0..self.classes)
            .map(|true_class| self.row(annotator, true_class).to_vec())
            .collect()
    }
}

/// `Σ |a - b|` between two marginal vectors
pub fn marginal_delta(current: &[f64], previous: &[f64]) -> f64 {
    current
        .iter()
        .zip(previous)
        .map(|(a, b)| (a - b).abs())
        .sum()
}

/// Index of the maximal value, resolving ties with `tie_break`
///
/// `values` must be non-empty. Ties are exact float equality with the maximum.
pub fn argmax<R: Rng + ?Sized>(values: &[f64], tie_break: TieBreak, rng: &mut R) -> usize {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let candidates: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, &value)| value == max)
        .map(|(idx, _)| idx)
        .collect();

    match (candidates.len(), tie_break) {
        (0, _) => 0,
        (1, _) | (_, TieBreak::LowestIndex) => candidates[0],
        (n, TieBreak::Random) => candidates[rng.gen_range(0..n)],
    }
}

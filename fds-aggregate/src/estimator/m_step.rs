//! M-step: maximum-likelihood class marginals and confusion matrices
//!
//! With `T` the current label distribution and `n` the count tensor:
//! ```text
//! p[j]       = Σ_i T[i][j] / |items|
//! π[k][j][l] = Σ_i T[i][j] · n[i][k][l]      (then each [k][j][·] row normalized)
//! ```
//! A row with no weighted evidence stays all zero.

use super::counts::CountTensor;
use super::model::{ErrorRates, LabelDistribution};

/// Estimate class marginals and per-annotator error rates
pub fn m_step(counts: &CountTensor, dist: &LabelDistribution) -> (Vec<f64>, ErrorRates) {
    let items = counts.items();
    let classes = counts.classes();

    let mut marginals = vec![0.0; classes];
    for item in 0..items {
        for (m, &p) in marginals.iter_mut().zip(dist.row(item)) {
            *m += p;
        }
    }
    if items > 0 {
        for m in marginals.iter_mut() {
            *m /= items as f64;
        }
    }

    let mut error_rates = ErrorRates::zeros(counts.annotators(), classes);
    for item in 0..items {
        let beliefs = dist.row(item);
        for annotator in 0..counts.annotators() {
            for (assigned, &count) in counts.row(item, annotator).iter().enumerate() {
                if count == 0 {
                    continue;
                }
                for (true_class, &weight) in beliefs.iter().enumerate() {
                    if weight > 0.0 {
                        error_rates.row_mut(annotator, true_class)[assigned] +=
                            weight * count as f64;
                    }
                }
            }
        }
    }

    for annotator in 0..counts.annotators() {
        for true_class in 0..classes {
            let row = error_rates.row_mut(annotator, true_class);
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                for rate in row.iter_mut() {
                    *rate /= sum;
                }
            }
        }
    }

    (marginals, error_rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_assignments() {
        // Two items, one annotator, two classes
        // item0 truly class 0, annotator said 0; item1 truly class 1, annotator said 0
        let mut counts = CountTensor::zeros(2, 1, 2);
        counts.increment(0, 0, 0);
        counts.increment(1, 0, 0);

        let mut dist = LabelDistribution::zeros(2, 2);
        dist.set_one_hot(0, 0);
        dist.set_one_hot(1, 1);

        let (marginals, rates) = m_step(&counts, &dist);
        assert_eq!(marginals, vec![0.5, 0.5]);
        assert_eq!(rates.row(0, 0), &[1.0, 0.0]);
        assert_eq!(rates.row(0, 1), &[1.0, 0.0]);
    }

    #[test]
    fn test_soft_weights_and_zero_rows() {
        // One item, two annotators, three classes
        let mut counts = CountTensor::zeros(1, 2, 3);
        counts.increment(0, 0, 0);
        counts.increment(0, 0, 1);
        counts.increment(0, 1, 1);

        let mut dist = LabelDistribution::zeros(1, 3);
        dist.row_mut(0).copy_from_slice(&[0.25, 0.75, 0.0]);

        let (marginals, rates) = m_step(&counts, &dist);
        assert_eq!(marginals, vec![0.25, 0.75, 0.0]);

        // Annotator 0 gave one 0 and one 1: weights are identical in every row
        assert_eq!(rates.row(0, 0), &[0.5, 0.5, 0.0]);
        assert_eq!(rates.row(0, 1), &[0.5, 0.5, 0.0]);
        // No belief in class 2: no evidence, row stays zero
        assert_eq!(rates.row(0, 2), &[0.0, 0.0, 0.0]);
        assert_eq!(rates.row(1, 1), &[0.0, 1.0, 0.0]);
    }
}

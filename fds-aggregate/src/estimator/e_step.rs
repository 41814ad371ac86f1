//! E-step (and C-step)
//!
//! Posterior numerator for item `i` and true class `j`:
//! ```text
//! score[i][j] = p[j] · Π_{k,l} π[k][j][l] ^ n[i][k][l]
//! ```
//! Soft phases normalize each row. Hard phases collapse each row to a one-hot
//! vector at its arg-max (the C-step).

use super::counts::CountTensor;
use super::model::{argmax, ErrorRates, LabelDistribution};
use super::params::{Phase, TieBreak};
use rand::Rng;

/// Fill `scores` with the unnormalized posterior of every class for `item`
///
/// Cells with a zero count contribute a factor of exactly 1, even when the
/// error rate itself is 0.
pub fn item_scores(
    counts: &CountTensor,
    marginals: &[f64],
    error_rates: &ErrorRates,
    item: usize,
    scores: &mut [f64],
) {
    for (true_class, score) in scores.iter_mut().enumerate() {
        let mut estimate = marginals[true_class];
        'annotators: for annotator in 0..counts.annotators() {
            let rates = error_rates.row(annotator, true_class);
            for (assigned, &count) in counts.row(item, annotator).iter().enumerate() {
                if count == 0 {
                    continue;
                }
                estimate *= rates[assigned].powi(count as i32);
                if estimate == 0.0 {
                    break 'annotators;
                }
            }
        }
        *score = estimate;
    }
}

/// Compute the new label distribution
pub fn e_step<R: Rng + ?Sized>(
    counts: &CountTensor,
    marginals: &[f64],
    error_rates: &ErrorRates,
    phase: Phase,
    tie_break: TieBreak,
    rng: &mut R,
) -> LabelDistribution {
    let classes = counts.classes();
    let mut dist = LabelDistribution::zeros(counts.items(), classes);
    let mut scores = vec![0.0; classes];

    for item in 0..counts.items() {
        item_scores(counts, marginals, error_rates, item, &mut scores);

        if phase.is_hard() {
            let class = argmax(&scores, tie_break, rng);
            dist.set_one_hot(item, class);
            continue;
        }

        let sum: f64 = scores.iter().sum();
        let row = dist.row_mut(item);
        // An all-zero row stays zero; the likelihood check reports it.
        if sum > 0.0 {
            for (p, &score) in row.iter_mut().zip(&scores) {
                *p = score / sum;
            }
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// One annotator who is right 80% of the time on two classes
    fn setup() -> (CountTensor, Vec<f64>, ErrorRates) {
        let mut counts = CountTensor::zeros(2, 1, 2);
        counts.increment(0, 0, 0);
        counts.increment(1, 0, 1);
        counts.increment(1, 0, 1);

        let mut rates = ErrorRates::zeros(1, 2);
        rates.row_mut(0, 0).copy_from_slice(&[0.8, 0.2]);
        rates.row_mut(0, 1).copy_from_slice(&[0.2, 0.8]);

        (counts, vec![0.5, 0.5], rates)
    }

    #[test]
    fn test_scores_use_count_powers() {
        let (counts, marginals, rates) = setup();
        let mut scores = vec![0.0; 2];

        item_scores(&counts, &marginals, &rates, 1, &mut scores);
        assert!((scores[0] - 0.5 * 0.2 * 0.2).abs() < 1e-12);
        assert!((scores[1] - 0.5 * 0.8 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_zero_rate_with_zero_count_is_neutral() {
        let mut counts = CountTensor::zeros(1, 1, 2);
        counts.increment(0, 0, 0);
        let mut rates = ErrorRates::zeros(1, 2);
        rates.row_mut(0, 0).copy_from_slice(&[1.0, 0.0]);
        rates.row_mut(0, 1).copy_from_slice(&[1.0, 0.0]);

        let mut scores = vec![0.0; 2];
        item_scores(&counts, &[0.5, 0.5], &rates, 0, &mut scores);
        assert_eq!(scores, vec![0.5, 0.5]);
    }

    #[test]
    fn test_soft_rows_normalize() {
        let (counts, marginals, rates) = setup();
        let mut rng = StdRng::seed_from_u64(0);

        let dist = e_step(
            &counts,
            &marginals,
            &rates,
            Phase::DawidSkene,
            TieBreak::Random,
            &mut rng,
        );
        assert!((dist.row(0)[0] - 0.8).abs() < 1e-12);
        assert!((dist.row(1)[1] - 0.64 / 0.68).abs() < 1e-12);
        for item in 0..2 {
            assert!((dist.row(item).iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_hard_rows_one_hot() {
        let (counts, marginals, rates) = setup();
        let mut rng = StdRng::seed_from_u64(0);

        for phase in [Phase::FastDawidSkene, Phase::HybridHard] {
            let dist = e_step(&counts, &marginals, &rates, phase, TieBreak::Random, &mut rng);
            assert_eq!(dist.row(0), &[1.0, 0.0]);
            assert_eq!(dist.row(1), &[0.0, 1.0]);
        }
    }

    #[test]
    fn test_degenerate_soft_row_stays_zero() {
        let mut counts = CountTensor::zeros(1, 1, 2);
        counts.increment(0, 0, 1);
        let mut rates = ErrorRates::zeros(1, 2);
        rates.row_mut(0, 0).copy_from_slice(&[1.0, 0.0]);
        rates.row_mut(0, 1).copy_from_slice(&[1.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(0);

        let dist = e_step(
            &counts,
            &[0.5, 0.5],
            &rates,
            Phase::HybridSoft,
            TieBreak::Random,
            &mut rng,
        );
        assert_eq!(dist.row(0), &[0.0, 0.0]);
    }
}

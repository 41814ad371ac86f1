//! Initial label distribution
//!
//! MV and FDS start from a one-hot majority vote. DS and H start from the
//! normalized vote frequencies of each item.

use super::counts::CountTensor;
use super::model::{argmax, LabelDistribution};
use super::params::{Algorithm, TieBreak};
use rand::Rng;

/// Build the initial label distribution for `algorithm`
///
/// An item with no labels at all gets a uniform distribution under DS/H;
/// under MV/FDS all classes tie and `tie_break` picks one.
pub fn initialize<R: Rng + ?Sized>(
    counts: &CountTensor,
    algorithm: Algorithm,
    tie_break: TieBreak,
    rng: &mut R,
) -> LabelDistribution {
    let classes = counts.classes();
    let mut dist = LabelDistribution::zeros(counts.items(), classes);

    for item in 0..counts.items() {
        let totals: Vec<f64> = counts.vote_totals(item).into_iter().map(f64::from).collect();

        if algorithm.initializes_with_majority_vote() {
            let class = argmax(&totals, tie_break, rng);
            dist.set_one_hot(item, class);
            continue;
        }

        let sum: f64 = totals.iter().sum();
        let row = dist.row_mut(item);
        if sum > 0.0 {
            for (p, total) in row.iter_mut().zip(&totals) {
                *p = total / sum;
            }
        } else {
            row.fill(1.0 / classes as f64);
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tensor(rows: &[(usize, usize, usize)], shape: (usize, usize, usize)) -> CountTensor {
        let mut counts = CountTensor::zeros(shape.0, shape.1, shape.2);
        for &(i, k, l) in rows {
            counts.increment(i, k, l);
        }
        counts
    }

    #[test]
    fn test_majority_vote_one_hot() {
        let counts = tensor(&[(0, 0, 0), (0, 1, 0), (0, 2, 1)], (1, 3, 2));
        let mut rng = StdRng::seed_from_u64(1);

        let dist = initialize(&counts, Algorithm::MajorityVote, TieBreak::Random, &mut rng);
        assert_eq!(dist.row(0), &[1.0, 0.0]);

        let dist = initialize(&counts, Algorithm::FastDawidSkene, TieBreak::Random, &mut rng);
        assert_eq!(dist.row(0), &[1.0, 0.0]);
    }

    #[test]
    fn test_frequency_initialization() {
        let counts = tensor(&[(0, 0, 0), (0, 1, 0), (0, 2, 1), (0, 2, 2)], (1, 3, 3));
        let mut rng = StdRng::seed_from_u64(1);

        for algorithm in [Algorithm::DawidSkene, Algorithm::Hybrid] {
            let dist = initialize(&counts, algorithm, TieBreak::Random, &mut rng);
            assert_eq!(dist.row(0), &[0.5, 0.25, 0.25]);
        }
    }

    #[test]
    fn test_majority_tie_lowest_index() {
        let counts = tensor(&[(0, 0, 2), (0, 1, 1)], (1, 2, 3));
        let mut rng = StdRng::seed_from_u64(1);

        let dist = initialize(&counts, Algorithm::MajorityVote, TieBreak::LowestIndex, &mut rng);
        assert_eq!(dist.row(0), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unlabeled_item_policies() {
        let counts = tensor(&[(0, 0, 0), (0, 0, 1)], (2, 1, 2));
        let mut rng = StdRng::seed_from_u64(1);

        let dist = initialize(&counts, Algorithm::DawidSkene, TieBreak::Random, &mut rng);
        assert_eq!(dist.row(1), &[0.5, 0.5]);

        let dist = initialize(&counts, Algorithm::MajorityVote, TieBreak::LowestIndex, &mut rng);
        assert_eq!(dist.row(1), &[1.0, 0.0]);
    }
}

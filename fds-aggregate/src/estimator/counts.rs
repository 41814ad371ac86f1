//! Count tensor construction
//!
//! Turns `item -> annotator -> [labels]` responses into a dense
//! `[item][annotator][class]` tensor of label counts. Items, annotators and
//! classes are indexed in sorted order of their identifiers, so the same
//! responses always produce the same tensor layout.

use std::collections::{BTreeMap, BTreeSet};

/// Crowd responses: item -> annotator -> labels given (repeats allowed)
pub type ResponseSet<I, A, L> = BTreeMap<I, BTreeMap<A, Vec<L>>>;

/// Dense `[item][annotator][class]` label counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountTensor {
    items: usize,
    annotators: usize,
    classes: usize,
    counts: Vec<u32>,
}

impl CountTensor {
    /// All-zero tensor of the given shape
    pub fn zeros(items: usize, annotators: usize, classes: usize) -> Self {
        Self {
            items,
            annotators,
            classes,
            counts: vec![0; items * annotators * classes],
        }
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn annotators(&self) -> usize {
        self.annotators
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    #[inline]
    fn offset(&self, item: usize, annotator: usize, class: usize) -> usize {
        (item * self.annotators + annotator) * self.classes + class
    }

    /// Number of times `annotator` gave `class` to `item`
    #[inline]
    pub fn get(&self, item: usize, annotator: usize, class: usize) -> u32 {
        self.counts[self.offset(item, annotator, class)]
    }

    pub fn increment(&mut self, item: usize, annotator: usize, class: usize) {
        let offset = self.offset(item, annotator, class);
        self.counts[offset] += 1;
    }

    /// Counts of one annotator on one item, indexed by class
    #[inline]
    pub fn row(&self, item: usize, annotator: usize) -> &[u32] {
        let start = self.offset(item, annotator, 0);
        &self.counts[start..start + self.classes]
    }

    /// Per-class vote totals for an item, summed over annotators
    pub fn vote_totals(&self, item: usize) -> Vec<u32> {
        let mut totals = vec![0u32; self.classes];
        for annotator in 0..self.annotators {
            for (total, &count) in totals.iter_mut().zip(self.row(item, annotator)) {
                *total += count;
            }
        }
        totals
    }

    /// Total number of observations in the tensor
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&count| count as u64).sum()
    }
}

/// Canonically ordered identifiers plus the tensor built from them
#[derive(Debug, Clone)]
pub struct IndexedCounts<I, A, L> {
    pub items: Vec<I>,
    pub annotators: Vec<A>,
    pub classes: Vec<L>,
    pub counts: CountTensor,
}

/// Build the count tensor from crowd responses
///
/// Annotators and classes are discovered from the responses; an item whose
/// annotators gave no labels keeps an all-zero slice.
pub fn build_counts<I, A, L>(responses: &ResponseSet<I, A, L>) -> IndexedCounts<I, A, L>
where
    I: Ord + Clone,
    A: Ord + Clone,
    L: Ord + Clone,
{
    let items: Vec<I> = responses.keys().cloned().collect();

    let mut annotator_set = BTreeSet::new();
    let mut class_set = BTreeSet::new();
    for by_annotator in responses.values() {
        for (annotator, labels) in by_annotator {
            annotator_set.insert(annotator);
            class_set.extend(labels.iter());
        }
    }

    let annotator_index: BTreeMap<&A, usize> = annotator_set
        .iter()
        .enumerate()
        .map(|(idx, &annotator)| (annotator, idx))
        .collect();
    let class_index: BTreeMap<&L, usize> = class_set
        .iter()
        .enumerate()
        .map(|(idx, &class)| (class, idx))
        .collect();

    let mut counts = CountTensor::zeros(items.len(), annotator_index.len(), class_index.len());
    for (item, by_annotator) in responses.values().enumerate() {
        for (annotator, labels) in by_annotator {
            let k = annotator_index[annotator];
            for label in labels {
                counts.increment(item, k, class_index[label]);
            }
        }
    }

    IndexedCounts {
        items,
        annotators: annotator_set.into_iter().cloned().collect(),
        classes: class_set.into_iter().cloned().collect(),
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(rows: &[(&str, &str, &[&str])]) -> ResponseSet<String, String, String> {
        let mut set = ResponseSet::new();
        for (item, annotator, labels) in rows {
            set.entry(item.to_string())
                .or_insert_with(BTreeMap::new)
                .insert(
                    annotator.to_string(),
                    labels.iter().map(|l| l.to_string()).collect(),
                );
        }
        set
    }

    #[test]
    fn test_canonical_order() {
        let set = responses(&[
            ("q2", "bob", &["neg"]),
            ("q1", "carol", &["pos"]),
            ("q1", "alice", &["neu"]),
        ]);

        let indexed = build_counts(&set);
        assert_eq!(indexed.items, vec!["q1", "q2"]);
        assert_eq!(indexed.annotators, vec!["alice", "bob", "carol"]);
        assert_eq!(indexed.classes, vec!["neg", "neu", "pos"]);

        // q1 / alice / neu
        assert_eq!(indexed.counts.get(0, 0, 1), 1);
        // q1 / carol / pos
        assert_eq!(indexed.counts.get(0, 2, 2), 1);
        // q2 / bob / neg
        assert_eq!(indexed.counts.get(1, 1, 0), 1);
        assert_eq!(indexed.counts.total(), 3);
    }

    #[test]
    fn test_repeated_labels_accumulate() {
        let set = responses(&[("q1", "alice", &["a", "a", "b"])]);

        let indexed = build_counts(&set);
        assert_eq!(indexed.counts.row(0, 0), &[2, 1]);
        assert_eq!(indexed.counts.total(), 3);
    }

    #[test]
    fn test_vote_totals_sum_over_annotators() {
        let set = responses(&[
            ("q1", "alice", &["a"]),
            ("q1", "bob", &["a"]),
            ("q1", "carol", &["b"]),
        ]);

        let indexed = build_counts(&set);
        assert_eq!(indexed.counts.vote_totals(0), vec![2, 1]);
    }

    #[test]
    fn test_item_without_labels_keeps_zero_slice() {
        let set = responses(&[("q1", "alice", &["a"]), ("q2", "bob", &[])]);

        let indexed = build_counts(&set);
        assert_eq!(indexed.items.len(), 2);
        assert_eq!(indexed.annotators, vec!["alice", "bob"]);
        assert_eq!(indexed.counts.vote_totals(1), vec![0]);
    }
}

//! Attribute affinity clustering, shared by the split-vector algorithms.
//!
//! The bond energy ordering goes back to McCormick's cluster analysis and is
//! the first phase of both [`Navathe`](super::Navathe) and
//! [`O2p`](super::O2p): co-accessed attributes end up adjacent, so that a
//! one-dimensional split of the ordering yields good column groups.

use crate::cost::PartitioningCostCalculator;
use crate::layout::from_split_vector;
use crate::workload::WorkloadSnapshot;

/// Symmetric attribute affinity matrix; entry `(i, j)` counts the queries
/// referencing both attributes.
pub fn affinity_matrix(w: &WorkloadSnapshot) -> Vec<Vec<i64>> {
    let n = w.attribute_count;
    let mut matrix = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let affinity = w
                .usage_matrix
                .iter()
                .filter(|usage| usage[i] == 1 && usage[j] == 1)
                .count() as i64;
            matrix[i][j] = affinity;
            matrix[j][i] = affinity;
        }
    }
    matrix
}

/// Bond energy ordering of the attributes: each attribute is inserted at the
/// position with the highest affinity contribution, ties going to the
/// rightmost position. The result is a permutation of `0..n`.
pub fn cluster_ordering(affinity: &[Vec<i64>]) -> Vec<usize> {
    let size = affinity.len();
    if size == 0 {
        return Vec::new();
    }

    // ordering[position] = attribute
    let mut ordering = vec![0usize];
    for attribute in 1..size {
        let mut max_contribution = i64::MIN;
        let mut max_index = 0;
        for j in 0..=ordering.len() {
            let left = (j > 0).then(|| ordering[j - 1]);
            let right = ordering.get(j).copied();
            let contribution = 2 * bond(affinity, left, Some(attribute))
                + 2 * bond(affinity, Some(attribute), right)
                - 2 * bond(affinity, left, right);
            if contribution >= max_contribution {
                max_contribution = contribution;
                max_index = j;
            }
        }
        ordering.insert(max_index, attribute);
    }
    ordering
}

fn bond(affinity: &[Vec<i64>], i: Option<usize>, j: Option<usize>) -> i64 {
    let (Some(i), Some(j)) = (i, j) else {
        return 0;
    };
    affinity.iter().map(|row| row[i] * row[j]).sum()
}

/// Search state for the split-vector enumerations. Every candidate split
/// vector is costed through [`evaluate`](SplitSearch::evaluate), which keeps
/// the cheapest partitioning seen so far; the strategies only decide which
/// candidates to probe and which splits to commit.
///
/// The search starts out holding the unsplit layout, so a workload no split
/// can improve yields the single-partition layout from every strategy.
pub(crate) struct SplitSearch<'a> {
    calculator: &'a dyn PartitioningCostCalculator,
    ordering: &'a [usize],
    iterations: u64,
    min_cost: f64,
    best: Vec<usize>,
}

impl<'a> SplitSearch<'a> {
    pub(crate) fn new(calculator: &'a dyn PartitioningCostCalculator, ordering: &'a [usize]) -> Self {
        let unsplit = vec![0; ordering.len()];
        let min_cost = calculator.partitioning_cost(&unsplit);
        SplitSearch {
            calculator,
            ordering,
            iterations: 0,
            min_cost,
            best: unsplit,
        }
    }

    /// Cost the partitioning induced by `split`, tracking the cheapest one.
    pub(crate) fn evaluate(&mut self, split: &[u8]) -> f64 {
        self.iterations += 1;
        let partitioning = from_split_vector(split, self.ordering);
        let cost = self.calculator.partitioning_cost(&partitioning);
        if cost < self.min_cost {
            self.min_cost = cost;
            self.best = partitioning;
        }
        cost
    }

    pub(crate) fn into_best(self) -> (Vec<usize>, u64) {
        (self.best, self.iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::Table;

    fn snapshot() -> WorkloadSnapshot {
        let mut t = Table::simple(4, 1000);
        t.add_projection_query("q0", 1, vec![0, 2]);
        t.add_projection_query("q1", 1, vec![1, 3]);
        WorkloadSnapshot::of_table(&t)
    }

    #[test]
    fn test_affinity_counts_co_usage() {
        let affinity = affinity_matrix(&snapshot());

        assert_eq!(affinity[0][2], 1);
        assert_eq!(affinity[2][0], 1);
        assert_eq!(affinity[1][3], 1);
        assert_eq!(affinity[0][1], 0);
        assert_eq!(affinity[0][0], 1);
    }

    #[test]
    fn test_ordering_groups_co_accessed_attributes() {
        let ordering = cluster_ordering(&affinity_matrix(&snapshot()));

        assert_eq!(ordering, vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_ordering_is_a_permutation() {
        let mut t = Table::simple(6, 1000);
        t.add_projection_query("q0", 1, vec![0, 4]);
        t.add_projection_query("q1", 2, vec![1, 2, 5]);
        t.add_projection_query("q2", 1, vec![2, 3]);
        let w = WorkloadSnapshot::of_table(&t);

        let mut ordering = cluster_ordering(&affinity_matrix(&w));
        ordering.sort_unstable();
        assert_eq!(ordering, vec![0, 1, 2, 3, 4, 5]);
    }
}

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cost::PartitioningCostCalculator;
use crate::layout::consecutive_partition_ids;

use super::clustering::{self, SplitSearch};
use super::navathe::enumerate_splits;
use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

/// Enumeration strategy of [`O2p`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum O2pMode {
    /// Full split enumeration restricted to the ordering positions holding
    /// referenced attributes.
    Pruning,
    /// Commit the cheapest single split, then recurse on the remaining
    /// positions until every split line is taken.
    Greedy,
    /// Greedy restricted to the two halves of the previous split, memoizing
    /// the best split of every other open partition.
    #[default]
    Dynamic,
}

/// O2P, the online variant of the Navathe algorithm (Jindal and Dittrich,
/// BIRTE 2011). Shares the bond energy ordering with [`Navathe`] but swaps
/// the exponential split enumeration for one of three cheaper strategies.
///
/// [`Navathe`]: super::Navathe
pub struct O2p {
    config: AlgorithmConfig,
    stats: SearchStats,
    calculator: Box<dyn PartitioningCostCalculator>,
    mode: O2pMode,
}

impl O2p {
    pub fn new(config: AlgorithmConfig) -> Self {
        Self::with_mode(config, O2pMode::default())
    }

    pub fn with_mode(config: AlgorithmConfig, mode: O2pMode) -> Self {
        let calculator = config.partitioning_calculator();
        O2p {
            config,
            stats: SearchStats::default(),
            calculator,
            mode,
        }
    }

    pub fn mode(&self) -> O2pMode {
        self.mode
    }

    /// Brute force over the ordering positions bracketing the referenced
    /// attributes; a fully unreferenced table is left unsplit.
    fn pruned(&self, search: &mut SplitSearch<'_>, ordering: &[usize], split: &mut [u8]) {
        let non_referenced: BTreeSet<usize> =
            self.config.w.non_referenced_attributes().into_iter().collect();

        let first = ordering.iter().position(|a| !non_referenced.contains(a));
        let last = ordering.iter().rposition(|a| !non_referenced.contains(a));
        if let (Some(x), Some(y)) = (first, last) {
            enumerate_splits(search, x, y, split);
        }
    }

    fn greedy(search: &mut SplitSearch<'_>, split: &mut [u8]) {
        let mut taken = vec![false; split.len()];
        loop {
            let mut local_min = f64::MAX;
            let mut best_split = None;
            for i in 0..split.len() {
                if taken[i] {
                    continue;
                }
                split[i] = 1;
                let cost = search.evaluate(split);
                split[i] = 0;
                if cost < local_min {
                    local_min = cost;
                    best_split = Some(i);
                }
            }
            match best_split {
                Some(i) => {
                    split[i] = 1;
                    taken[i] = true;
                }
                None => return,
            }
        }
    }

    fn dynamic(search: &mut SplitSearch<'_>, split: &mut [u8]) {
        // open partition start -> its cheapest split and that split's cost
        let mut per_split_optimal: BTreeMap<usize, (usize, f64)> = BTreeMap::new();
        let mut left = 0usize;
        let mut right = split.len();

        loop {
            let left_best = best_split_from(search, split, left);
            let right_best = best_split_from(search, split, right);
            let stored_best = per_split_optimal
                .iter()
                .min_by(|a, b| a.1.1.total_cmp(&b.1.1))
                .map(|(&start, &(i, cost))| (start, i, cost));

            let mut min_cost = f64::MAX;
            if let Some((_, cost)) = left_best {
                min_cost = min_cost.min(cost);
            }
            if let Some((_, cost)) = right_best {
                min_cost = min_cost.min(cost);
            }
            if let Some((_, _, cost)) = stored_best {
                min_cost = min_cost.min(cost);
            }
            if min_cost == f64::MAX {
                // fully partitioned
                return;
            }

            if let Some((i, cost)) = left_best
                && cost == min_cost
            {
                split[i] = 1;
                if let Some(stash) = right_best {
                    per_split_optimal.insert(right, stash);
                }
                right = i + 1;
            } else if let Some((i, cost)) = right_best
                && cost == min_cost
            {
                split[i] = 1;
                if let Some(stash) = left_best {
                    per_split_optimal.insert(left, stash);
                }
                left = right;
                right = i + 1;
            } else if let Some((start, i, _)) = stored_best {
                split[i] = 1;
                if let Some(stash) = right_best {
                    per_split_optimal.insert(right, stash);
                }
                if let Some(stash) = left_best {
                    per_split_optimal.insert(left, stash);
                }
                per_split_optimal.remove(&start);
                left = start;
                right = i + 1;
            } else {
                return;
            }
        }
    }
}

/// Cheapest split within the open partition starting at ordering position
/// `from`, probing every position up to the next committed split.
fn best_split_from(
    search: &mut SplitSearch<'_>,
    split: &mut [u8],
    from: usize,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for i in from..split.len() {
        if split[i] == 1 {
            break;
        }
        split[i] = 1;
        let cost = search.evaluate(split);
        split[i] = 0;
        if best.is_none_or(|(_, c)| cost < c) {
            best = Some((i, cost));
        }
    }
    best
}

impl VerticalPartitioner for O2p {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::O2p
    }

    fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut SearchStats {
        &mut self.stats
    }

    fn do_partition(&mut self) -> Result<Layout, AlgoError> {
        let ordering = clustering::cluster_ordering(&clustering::affinity_matrix(&self.config.w));
        if ordering.is_empty() {
            return Ok(Layout::Partitioning(Vec::new()));
        }

        let mut search = SplitSearch::new(self.calculator.as_ref(), &ordering);
        let mut split = vec![0u8; ordering.len() - 1];
        match self.mode {
            O2pMode::Pruning => self.pruned(&mut search, &ordering, &mut split),
            O2pMode::Greedy => Self::greedy(&mut search, &mut split),
            O2pMode::Dynamic => Self::dynamic(&mut search, &mut split),
        }

        let (best, iterations) = search.into_best();
        self.stats.iterations = iterations;
        debug!("o2p {:?} probed {iterations} split vectors", self.mode);

        Ok(Layout::Partitioning(consecutive_partition_ids(&best)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModelKind;
    use crate::workload::Table;

    fn two_query_table() -> Table {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);
        t
    }

    fn assert_splits_disjoint_queries(partitioning: &[usize]) {
        assert_eq!(partitioning[0], partitioning[1]);
        assert_eq!(partitioning[2], partitioning[3]);
        assert_ne!(partitioning[0], partitioning[2]);
    }

    #[test]
    fn test_all_modes_split_disjoint_queries() {
        for mode in [O2pMode::Pruning, O2pMode::Greedy, O2pMode::Dynamic] {
            let config = AlgorithmConfig::new(two_query_table(), CostModelKind::Disk);
            let mut algo = O2p::with_mode(config, mode);
            let Layout::Partitioning(partitioning) = algo.partition().unwrap() else {
                panic!("expected a partitioning");
            };
            assert_splits_disjoint_queries(&partitioning);
        }
    }

    #[test]
    fn test_default_mode_is_dynamic() {
        let algo = O2p::new(AlgorithmConfig::new(two_query_table(), CostModelKind::Disk));
        assert_eq!(algo.mode(), O2pMode::Dynamic);
    }

    #[test]
    fn test_greedy_probes_quadratically_many_candidates() {
        let config = AlgorithmConfig::new(two_query_table(), CostModelKind::Disk);
        let mut algo = O2p::with_mode(config, O2pMode::Greedy);
        algo.partition().unwrap();

        // 3 + 2 + 1 probes over the three split positions
        assert_eq!(algo.stats().iterations, 6);
    }

    #[test]
    fn test_pruning_leaves_unreferenced_attributes_alone() {
        let mut t = Table::simple(5, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);

        let config = AlgorithmConfig::new(t, CostModelKind::Disk);
        let mut algo = O2p::with_mode(config, O2pMode::Pruning);
        let Layout::Partitioning(partitioning) = algo.partition().unwrap() else {
            panic!("expected a partitioning");
        };

        assert_splits_disjoint_queries(&partitioning);
        assert_eq!(partitioning.len(), 5);
    }
}

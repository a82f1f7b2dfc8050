use std::collections::BTreeMap;

use log::debug;

use crate::common::BitSet;
use crate::cost::PartitioningCostCalculator;
use crate::layout::partitioning_of_partitions;

use super::graph::{GraphPartitioner, MetisPartitioner};
use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

/// Number of vertex groups the affinity graph is cut into.
const GRAPH_GROUPS: usize = 3;

/// The HYRISE layouter (Grund et al., PVLDB 2010).
///
/// Primary partitions (attribute groups always accessed together) form the
/// vertices of an affinity graph that a k-way graph partitioner cuts into
/// groups small enough for exhaustive treatment. Within each group, merge
/// candidates are screened by cost, the cheapest covering layout is
/// enumerated, and a final pass merges partitions across group layouts while
/// it pays off.
pub struct Hyrise {
    config: AlgorithmConfig,
    stats: SearchStats,
    calculator: Box<dyn PartitioningCostCalculator>,
    graph_partitioner: Box<dyn GraphPartitioner>,
}

impl Hyrise {
    pub fn new(config: AlgorithmConfig) -> Self {
        Self::with_graph_partitioner(config, Box::new(MetisPartitioner::new()))
    }

    /// Run with a different graph partitioner, mainly for tests that must
    /// not depend on the METIS binary.
    pub fn with_graph_partitioner(
        config: AlgorithmConfig,
        graph_partitioner: Box<dyn GraphPartitioner>,
    ) -> Self {
        let calculator = config.partitioning_calculator();
        Hyrise {
            config,
            stats: SearchStats::default(),
            calculator,
            graph_partitioner,
        }
    }

    /// Split the attribute set into primary partitions: per query, separate
    /// every group into its accessed and non-accessed parts.
    fn primary_partitions(&self) -> Vec<Vec<usize>> {
        let w = &self.config.w;
        let mut partitions: Vec<Vec<usize>> = vec![(0..w.attribute_count).collect()];

        for usage in &w.usage_matrix {
            let mut split = Vec::with_capacity(partitions.len());
            for partition in &partitions {
                let (accessed, non_accessed): (Vec<usize>, Vec<usize>) =
                    partition.iter().copied().partition(|&a| usage[a] == 1);
                if !non_accessed.is_empty() {
                    split.push(non_accessed);
                }
                if !accessed.is_empty() {
                    split.push(accessed);
                }
            }
            partitions = split;
        }

        partitions
    }

    /// Queries referencing both attributes; the diagonal counts plain access.
    fn co_access_count(&self, a: usize, b: usize) -> i64 {
        self.config
            .w
            .usage_matrix
            .iter()
            .filter(|usage| usage[a] == 1 && usage[b] == 1)
            .count() as i64
    }

    /// Affinity between primary partitions, measured on one representative
    /// attribute each; all attributes of a primary partition share the same
    /// usage column.
    fn affinity_matrix(&self, partitions: &[Vec<usize>]) -> Vec<Vec<i64>> {
        partitions
            .iter()
            .map(|p| {
                partitions
                    .iter()
                    .map(|q| self.co_access_count(p[0], q[0]))
                    .collect()
            })
            .collect()
    }

    /// Enumerate all merges of the group's primary partitions, keeping a
    /// merge only when it costs less than its parts read separately.
    fn merge_candidates(&self, group: &[Vec<usize>]) -> Vec<BitSet> {
        let mut merged = Vec::new();
        self.do_merge(&mut merged, group, BitSet::new(), 0);
        merged
    }

    fn do_merge(&self, merged: &mut Vec<BitSet>, group: &[Vec<usize>], taken: BitSet, index: usize) {
        if index < group.len() {
            self.do_merge(merged, group, taken.with_bit(index), index + 1);
            self.do_merge(merged, group, taken, index + 1);
            return;
        }
        if taken.is_empty() {
            return;
        }

        let all_queries = self.all_queries();
        let ids: Vec<usize> = taken.iter_ones().collect();

        let individual: Vec<Vec<usize>> = ids.iter().map(|&i| group[i].clone()).collect();
        let combined: Vec<usize> = individual.iter().flatten().copied().collect();

        let individual_cost = self.calculator.partitions_cost(&individual, &all_queries);
        let merged_cost = self
            .calculator
            .partitions_cost(std::slice::from_ref(&combined), &all_queries);

        if merged_cost >= individual_cost {
            for &i in &ids {
                push_unique(merged, BitSet::from_bits(&[i]));
            }
        } else {
            push_unique(merged, taken);
        }
    }

    /// Cheapest subset of merge candidates that covers the group's attributes
    /// without overlap. The layout keeps the primary partitions separate; a
    /// merge candidate only forces its members into the layout together.
    fn generate_layout(&self, candidates: &[BitSet], group: &[Vec<usize>]) -> Vec<Vec<usize>> {
        let mut valid_layout = BitSet::new();
        for partition in group {
            for &a in partition {
                valid_layout.set(a);
            }
        }

        let mut best: Option<(Vec<Vec<usize>>, f64)> = None;
        self.do_generate(candidates, group, &valid_layout, BitSet::new(), 0, &mut best);

        match best {
            Some((layout, _)) => layout,
            // a group always covers itself, so the enumeration finds at
            // least the all-primary-partitions layout
            None => group.to_vec(),
        }
    }

    fn do_generate(
        &self,
        candidates: &[BitSet],
        group: &[Vec<usize>],
        valid_layout: &BitSet,
        taken: BitSet,
        index: usize,
        best: &mut Option<(Vec<Vec<usize>>, f64)>,
    ) {
        if index < candidates.len() {
            self.do_generate(candidates, group, valid_layout, taken.with_bit(index), index + 1, best);
            self.do_generate(candidates, group, valid_layout, taken, index + 1, best);
            return;
        }

        let mut attribute_bitmap = BitSet::new();
        let mut partitions = Vec::new();
        for i in taken.iter_ones() {
            for p in candidates[i].iter_ones() {
                let partition_bits = BitSet::from_bits(&group[p]);
                if attribute_bitmap.intersects(&partition_bits) {
                    return;
                }
                attribute_bitmap.union_with(&partition_bits);
                partitions.push(group[p].clone());
            }
        }
        if !attribute_bitmap.same_bits(valid_layout) {
            return;
        }

        let cost = self
            .calculator
            .partitions_cost(&partitions, &self.all_queries());
        if best.as_ref().is_none_or(|(_, c)| cost < *c) {
            *best = Some((partitions, cost));
        }
    }

    /// Repeatedly merge the partition pair from two different group layouts
    /// with the largest cost saving; merged pairs become layouts of their
    /// own, beyond the reach of the pair search.
    fn merge_across_layouts(&self, layouts: &mut Vec<Vec<Vec<usize>>>, max_idx: usize) {
        let all_queries = self.all_queries();

        loop {
            let mut max_saving = 0.0;
            let mut merge: Option<(usize, usize, usize, usize)> = None;

            for i in 0..max_idx {
                for j in 0..max_idx {
                    if i == j {
                        continue;
                    }
                    for x in 0..layouts[i].len() {
                        for y in 0..layouts[j].len() {
                            let pair = vec![layouts[i][x].clone(), layouts[j][y].clone()];
                            let combined: Vec<usize> = pair.iter().flatten().copied().collect();

                            let separate = self.calculator.partitions_cost(&pair, &all_queries);
                            let together = self
                                .calculator
                                .partitions_cost(std::slice::from_ref(&combined), &all_queries);

                            if separate - together > max_saving {
                                max_saving = separate - together;
                                merge = Some((i, j, x, y));
                            }
                        }
                    }
                }
            }

            let Some((i, j, x, y)) = merge else {
                return;
            };
            let left = layouts[i].remove(x);
            let right = layouts[j].remove(y);
            let combined: Vec<usize> = left.into_iter().chain(right).collect();
            layouts.push(vec![combined]);
        }
    }

    fn all_queries(&self) -> Vec<usize> {
        (0..self.config.w.query_count).collect()
    }
}

impl VerticalPartitioner for Hyrise {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Hyrise
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
        let w = &self.config.w;

        // every query touching every attribute leaves nothing to split
        let touched: usize = w.usage_matrix.iter().flatten().map(|&u| usize::from(u)).sum();
        if touched == w.query_count * w.attribute_count {
            return Ok(Layout::row(w.attribute_count));
        }

        let primary = self.primary_partitions();
        self.stats.candidate_set_size = primary.len() as u64;
        debug!("hyrise found {} primary partitions", primary.len());

        let affinity = self.affinity_matrix(&primary);
        let assignment = self.graph_partitioner.partition(&affinity, GRAPH_GROUPS)?;

        let mut groups: BTreeMap<usize, Vec<Vec<usize>>> = BTreeMap::new();
        for (vertex, &group) in assignment.iter().enumerate() {
            groups.entry(group).or_default().push(primary[vertex].clone());
        }

        let mut layouts: Vec<Vec<Vec<usize>>> = Vec::new();
        for group in groups.values() {
            let candidates = self.merge_candidates(group);
            layouts.push(self.generate_layout(&candidates, group));
        }

        let group_count = layouts.len();
        self.merge_across_layouts(&mut layouts, group_count);

        let partitions: Vec<Vec<usize>> = layouts.into_iter().flatten().collect();
        Ok(Layout::Partitioning(partitioning_of_partitions(
            &partitions,
            w.attribute_count,
        )?))
    }
}

fn push_unique(masks: &mut Vec<BitSet>, mask: BitSet) {
    if !masks.iter().any(|m| m.same_bits(&mask)) {
        masks.push(mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::graph::GraphPartitionError;
    use crate::cost::CostModelKind;
    use crate::workload::Table;

    /// Deterministic stand-in for METIS: deals vertices out round-robin.
    struct RoundRobinPartitioner;

    impl GraphPartitioner for RoundRobinPartitioner {
        fn partition(
            &self,
            affinity: &[Vec<i64>],
            k: usize,
        ) -> Result<Vec<usize>, GraphPartitionError> {
            Ok((0..affinity.len()).map(|v| v % k).collect())
        }
    }

    fn hyrise(t: Table) -> Hyrise {
        Hyrise::with_graph_partitioner(
            AlgorithmConfig::new(t, CostModelKind::Mem),
            Box::new(RoundRobinPartitioner),
        )
    }

    #[test]
    fn test_primary_partitions_split_per_query() {
        let mut t = Table::simple(4, 1000);
        t.add_projection_query("q0", 1, vec![0, 1, 2]);
        t.add_projection_query("q1", 1, vec![1, 2, 3]);

        let algo = hyrise(t);
        let mut primary = algo.primary_partitions();
        primary.sort();

        assert_eq!(primary, vec![vec![0], vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_all_attributes_accessed_shortcut() {
        let mut t = Table::simple(3, 1000);
        t.add_projection_query("q0", 1, vec![0, 1, 2]);

        let mut algo = hyrise(t);
        assert_eq!(algo.partition().unwrap(), Layout::Partitioning(vec![0, 0, 0]));
    }

    #[test]
    fn test_disjoint_queries_split_the_table() {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);

        let mut algo = hyrise(t);
        let Layout::Partitioning(partitioning) = algo.partition().unwrap() else {
            panic!("expected a partitioning");
        };

        assert_eq!(partitioning.len(), 4);
        assert_eq!(partitioning[0], partitioning[1]);
        assert_eq!(partitioning[2], partitioning[3]);
        assert_ne!(partitioning[0], partitioning[2]);
    }

    #[test]
    fn test_layout_covers_every_attribute() {
        let mut t = Table::simple(6, 100_000);
        t.add_projection_query("q0", 1, vec![0, 2, 4]);
        t.add_projection_query("q1", 2, vec![1, 3]);
        t.add_projection_query("q2", 1, vec![4, 5]);

        let mut algo = hyrise(t);
        let Layout::Partitioning(partitioning) = algo.partition().unwrap() else {
            panic!("expected a partitioning");
        };

        assert_eq!(partitioning.len(), 6);
    }
}

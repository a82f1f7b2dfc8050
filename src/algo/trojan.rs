use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::common::BitSet;
use crate::cost::{IoCost, PartitioningCostCalculator, PartitioningProfiler};
use crate::layout::{
    PartitionsMap, SelectionPlan, consecutive_partition_ids, map_of_partitioning, partitions_of,
    row_layout,
};
use crate::workload::{Table, WorkloadSnapshot};

use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

/// Stand-in for probability 1.0 in the interestingness terms; a plain 1.0
/// would make ln(p) vanish for attributes every query reads.
const MAX_ATTRIBUTE_COST: f64 = 0.999999;

/// Column groups are enumerated as `u64` masks, one bit per attribute.
const MAX_ENUMERATED_ATTRIBUTES: usize = 63;

/// Trojan data layouts (Jindal, Quiane-Ruiz and Dittrich, SOCC 2011).
///
/// Column groups are scored by an interestingness measure built on the mutual
/// information between attribute access patterns; a branch and bound knapsack
/// then packs disjoint groups, yielding one candidate partitioning per
/// possible partition count, and the cheapest valid candidate wins.
///
/// With `replication_factor > 1` the same machinery first runs on the
/// transposed usage matrix to route queries to replicas, then computes one
/// partitioning per replica over the attributes its queries reference.
pub struct TrojanLayout {
    config: AlgorithmConfig,
    stats: SearchStats,
    replication_factor: usize,
    /// Threshold applied when grouping queries (and by sub-runs).
    pruning_threshold: f64,
    /// Per-replica thresholds for the attribute partitionings.
    pruning_thresholds: Vec<f64>,
    per_replica_partitioning: Vec<Vec<usize>>,
    replica_queries: Vec<Vec<usize>>,
    query_grouping: Vec<usize>,
}

impl TrojanLayout {
    pub fn new(config: AlgorithmConfig) -> Result<Self, AlgoError> {
        if config.w.attribute_count > MAX_ENUMERATED_ATTRIBUTES {
            return Err(AlgoError::TooManyAttributes {
                count: config.w.attribute_count,
                max: MAX_ENUMERATED_ATTRIBUTES,
            });
        }
        Ok(TrojanLayout {
            config,
            stats: SearchStats::default(),
            replication_factor: 1,
            pruning_threshold: 0.0,
            pruning_thresholds: Vec::new(),
            per_replica_partitioning: Vec::new(),
            replica_queries: Vec::new(),
            query_grouping: Vec::new(),
        })
    }

    pub fn with_replication_factor(mut self, replication_factor: usize) -> Self {
        self.replication_factor = replication_factor.max(1);
        self
    }

    pub fn with_pruning_threshold(mut self, threshold: f64) -> Self {
        self.pruning_threshold = threshold;
        self
    }

    pub fn with_pruning_thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.pruning_thresholds = thresholds;
        self
    }

    /// One partitioning per replica, available after [`partition`] ran.
    ///
    /// [`partition`]: VerticalPartitioner::partition
    pub fn per_replica_partitioning(&self) -> &[Vec<usize>] {
        &self.per_replica_partitioning
    }

    /// Replica id each query is routed to.
    pub fn query_grouping(&self) -> &[usize] {
        &self.query_grouping
    }

    /// Enumerate interesting column groups of `w` and pack them with the
    /// knapsack. The result holds one candidate partitioning per partition
    /// count; counts the knapsack never filled stay `None`.
    fn column_group_candidates(
        &mut self,
        w: &WorkloadSnapshot,
        threshold: f64,
    ) -> Result<Vec<Option<Vec<usize>>>, AlgoError> {
        if w.attribute_count > MAX_ENUMERATED_ATTRIBUTES {
            return Err(AlgoError::TooManyAttributes {
                count: w.attribute_count,
                max: MAX_ENUMERATED_ATTRIBUTES,
            });
        }

        let interestingness = GroupInterestingness::new(w);
        let groups = enumerate_groups(&interestingness, w.attribute_count, threshold);
        self.stats.candidate_set_size = groups.len() as u64;
        debug!(
            "{} column groups above interestingness threshold {threshold}",
            groups.len()
        );

        let mut solver = BbKnapsack::new(w.attribute_count, &groups);
        solver.solve();
        self.stats.iterations = solver.count;

        Ok(solver.item_partitions())
    }

    /// Cheapest candidate partitioning, defaulting to the row layout when the
    /// knapsack produced nothing usable.
    fn best_partitioning(
        calculator: &dyn PartitioningCostCalculator,
        attribute_count: usize,
        candidates: &[Option<Vec<usize>>],
    ) -> Vec<usize> {
        let mut min_cost = f64::MAX;
        let mut best: Option<&Vec<usize>> = None;

        for candidate in candidates.iter().flatten() {
            let cost = calculator.partitioning_cost(&consecutive_partition_ids(candidate));
            if cost < min_cost {
                min_cost = cost;
                best = Some(candidate);
            }
        }

        best.cloned().unwrap_or_else(|| row_layout(attribute_count))
    }

    /// Overlapping view of a replicated layout: every replica contributes its
    /// partitions, and each query selects the partitions of its replica that
    /// hold attributes it references.
    fn replicated_layout(&self) -> Layout {
        let w = &self.config.w;
        let mut partitions = PartitionsMap::new();
        let mut plan = SelectionPlan::new();
        let mut next_id = 0usize;

        for (partitioning, queries) in self
            .per_replica_partitioning
            .iter()
            .zip(&self.replica_queries)
        {
            let mut global_ids: BTreeMap<usize, usize> = BTreeMap::new();
            for (local, attributes) in map_of_partitioning(partitioning) {
                global_ids.insert(local, next_id);
                partitions.insert(next_id, attributes);
                next_id += 1;
            }

            for &q in queries {
                let selected: BTreeSet<usize> = (0..w.attribute_count)
                    .filter(|&a| w.usage_matrix[q][a] == 1)
                    .filter_map(|a| global_ids.get(&partitioning[a]).copied())
                    .collect();
                plan.insert(q, selected);
            }
        }

        Layout::Partitions { partitions, plan }
    }

    /// Redundant bytes read per row, summed over the replicas.
    pub fn redundant_bytes_read(&self) -> u64 {
        let profiler = PartitioningProfiler::new(&self.config.w);
        self.per_replica_partitioning
            .iter()
            .zip(&self.replica_queries)
            .map(|(partitioning, queries)| {
                profiler.redundant_bytes_read_per_row(partitioning, queries)
            })
            .sum()
    }

    /// Like [`redundant_bytes_read`], assuming each replica carries a
    /// clustered index on its most selective range attribute. The winning
    /// range filters are marked on the table.
    ///
    /// [`redundant_bytes_read`]: TrojanLayout::redundant_bytes_read
    pub fn redundant_bytes_read_indexed(&self, table: &mut Table) -> u64 {
        for queries in &self.replica_queries {
            mark_index(table, queries);
        }
        self.redundant_bytes_read()
    }

    /// Workload I/O cost of the replicated layout, each query routed to its
    /// replica.
    pub fn estimated_costs(&self) -> IoCost {
        let calculator = self.config.partitioning_calculator();
        let mut total = IoCost::default();

        for (partitioning, queries) in self
            .per_replica_partitioning
            .iter()
            .zip(&self.replica_queries)
        {
            total += calculator.partitions_costs(&partitions_of(partitioning), queries);
        }

        total
    }

    pub fn estimated_cost(&self) -> f64 {
        self.estimated_costs().total()
    }

    /// Cost of transforming an existing replicated layout into this one,
    /// replica by replica.
    pub fn layout_creation_cost(&self, source: &[Vec<usize>]) -> f64 {
        let calculator = self.config.partitioning_calculator();
        source
            .iter()
            .zip(&self.per_replica_partitioning)
            .map(|(from, to)| calculator.layout_creation_cost(from, to))
            .sum()
    }
}

/// Pick the index attribute for a replica: assuming a clustered index, take
/// the range attribute touching the fewest rows across the replica's queries,
/// and mark the filters on that attribute as indexed.
fn mark_index(table: &mut Table, replica_queries: &[usize]) {
    let mut touched_rows: BTreeMap<usize, u64> = BTreeMap::new();
    for &q in replica_queries {
        if let Some(filter) = &table.queries[q].range_filter {
            *touched_rows.entry(filter.attribute).or_insert(0) += filter.touched_rows;
        }
    }

    let index_attribute = touched_rows
        .iter()
        .min_by_key(|&(_, &touched)| touched)
        .map(|(&a, _)| a);

    for &q in replica_queries {
        if let Some(filter) = &mut table.queries[q].range_filter {
            filter.indexed = Some(filter.attribute) == index_attribute;
        }
    }
}

impl VerticalPartitioner for TrojanLayout {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Trojan
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
        let w = self.config.w.clone();

        self.query_grouping = if self.replication_factor > 1 {
            // group the queries by running the same algorithm on the
            // transposed usage matrix
            let rotated = w.transposed_for_queries();
            let candidates = self.column_group_candidates(&rotated, self.pruning_threshold)?;
            candidates
                .get(self.replication_factor - 1)
                .cloned()
                .flatten()
                .unwrap_or_else(|| vec![0; w.query_count])
        } else {
            vec![0; w.query_count]
        };

        self.per_replica_partitioning.clear();
        self.replica_queries.clear();

        for query_group in partitions_of(&self.query_grouping) {
            if query_group.is_empty() {
                continue;
            }
            let replica = self.per_replica_partitioning.len();

            let referenced = w.referenced_attributes(&query_group);
            let subset_partitioning = if query_group.len() == 1 {
                // a single query wants all its attributes together
                vec![0; referenced.len()]
            } else {
                let reduced = self
                    .config
                    .with_table(self.config.table.partial(&referenced, &query_group));
                let threshold = self
                    .pruning_thresholds
                    .get(replica)
                    .copied()
                    .unwrap_or(self.pruning_threshold);

                let mut sub = TrojanLayout::new(reduced)?.with_pruning_threshold(threshold);
                let sub_w = sub.config.w.clone();
                let candidates = sub.column_group_candidates(&sub_w, threshold)?;
                let calculator = sub.config.partitioning_calculator();
                Self::best_partitioning(calculator.as_ref(), sub_w.attribute_count, &candidates)
            };

            // unreferenced attributes go to partition 0, shifting the rest up
            let shift = usize::from(referenced.len() < w.attribute_count);
            let mut replica_partitioning = row_layout(w.attribute_count);
            for (i, &a) in referenced.iter().enumerate() {
                replica_partitioning[a] = subset_partitioning[i] + shift;
            }

            self.per_replica_partitioning
                .push(consecutive_partition_ids(&replica_partitioning));
            self.replica_queries.push(query_group);
        }

        if self.replication_factor == 1 {
            return Ok(Layout::Partitioning(
                self.per_replica_partitioning[0].clone(),
            ));
        }
        Ok(self.replicated_layout())
    }
}

/// All column groups whose interestingness reaches the threshold, as
/// attribute masks.
fn enumerate_groups(
    interestingness: &GroupInterestingness<'_>,
    attribute_count: usize,
    threshold: f64,
) -> BTreeMap<u64, f64> {
    let mut groups = BTreeMap::new();
    for mask in 1..(1u64 << attribute_count) {
        let score = interestingness.of_group(mask);
        if score >= threshold {
            groups.insert(mask, score);
        }
    }
    groups
}

/// The interestingness measure: how strongly the access patterns of a column
/// group's attributes correlate, in terms of mutual information weighted by
/// the byte footprint of the queries.
struct GroupInterestingness<'a> {
    w: &'a WorkloadSnapshot,
    query_footprint: Vec<f64>,
    total_footprint: f64,
}

impl<'a> GroupInterestingness<'a> {
    fn new(w: &'a WorkloadSnapshot) -> Self {
        let query_footprint: Vec<f64> = (0..w.query_count)
            .map(|q| {
                (0..w.attribute_count)
                    .filter(|&a| w.usage_matrix[q][a] > 0)
                    .map(|a| w.num_rows as f64 * w.attribute_sizes[a] as f64)
                    .sum()
            })
            .collect();
        let total_footprint = query_footprint.iter().sum();

        GroupInterestingness {
            w,
            query_footprint,
            total_footprint,
        }
    }

    /// Fraction of the workload footprint that reads (`x == 1`) or skips
    /// (`x == 0`) the attribute.
    fn attribute_cost(&self, attribute: usize, x: u8) -> f64 {
        let cost: f64 = (0..self.w.query_count)
            .map(|q| {
                let usage = self.w.usage_matrix[q][attribute];
                let factor = if x == 1 { usage } else { 1 - usage };
                self.query_footprint[q] * f64::from(factor)
            })
            .sum();

        if cost == self.total_footprint {
            MAX_ATTRIBUTE_COST
        } else {
            cost / self.total_footprint
        }
    }

    fn pair_cost(&self, a1: usize, a2: usize, x: u8, y: u8) -> f64 {
        let cost: f64 = (0..self.w.query_count)
            .map(|q| {
                let usage1 = self.w.usage_matrix[q][a1];
                let usage2 = self.w.usage_matrix[q][a2];
                let factor1 = if x == 1 { usage1 } else { 1 - usage1 };
                let factor2 = if y == 1 { usage2 } else { 1 - usage2 };
                self.query_footprint[q] * f64::from(factor1) * f64::from(factor2)
            })
            .sum();

        if cost == self.total_footprint {
            MAX_ATTRIBUTE_COST
        } else {
            cost / self.total_footprint
        }
    }

    fn entropy(&self, attribute: usize) -> f64 {
        [0u8, 1u8]
            .into_iter()
            .map(|x| self.attribute_cost(attribute, x))
            .filter(|&p| p > 0.0)
            .map(|p| -p * p.ln())
            .sum()
    }

    fn mutual_information(&self, a1: usize, a2: usize) -> f64 {
        let mut mi = 0.0;
        for x in [0u8, 1u8] {
            for y in [0u8, 1u8] {
                let p = self.pair_cost(a1, a2, x, y);
                if p > 0.0 {
                    mi += p * (p / self.attribute_cost(a1, x) / self.attribute_cost(a2, y)).ln();
                }
            }
        }
        mi
    }

    fn norm_mi(&self, a1: usize, a2: usize) -> f64 {
        let min_entropy = self.entropy(a1).min(self.entropy(a2));
        let mi = self.mutual_information(a1, a2);
        if mi == 0.0 {
            0.0
        } else if min_entropy == 0.0 {
            1.0
        } else {
            mi / min_entropy
        }
    }

    fn norm_inverse_mi(&self, a1: usize, a2: usize) -> f64 {
        let min_entropy = self.entropy(a1).min(self.entropy(a2));
        let mi = self.mutual_information(a1, a2);
        if mi == 0.0 {
            0.0
        } else if min_entropy == 0.0 {
            1.0
        } else {
            (min_entropy - mi) / min_entropy
        }
    }

    /// Interestingness of the group mask: a lone attribute scores by how
    /// independent it is of everything else, a group by the average pairwise
    /// correlation of its members.
    fn of_group(&self, mask: u64) -> f64 {
        let members: Vec<usize> = (0..self.w.attribute_count)
            .filter(|&a| mask & (1u64 << a) != 0)
            .collect();

        match members.as_slice() {
            [single] => {
                let others: Vec<usize> = (0..self.w.attribute_count)
                    .filter(|&a| a != *single)
                    .collect();
                if others.is_empty() {
                    return 1.0;
                }
                others
                    .iter()
                    .map(|&other| self.norm_inverse_mi(*single, other))
                    .sum::<f64>()
                    / others.len() as f64
            }
            members => {
                let mut total = 0.0;
                let mut pairs = 0usize;
                for i in 0..members.len() - 1 {
                    for j in i + 1..members.len() {
                        total += self.norm_mi(members[i], members[j]);
                        pairs += 1;
                    }
                }
                total / pairs as f64
            }
        }
    }
}

/// Branch and bound knapsack over the column groups: branch on every group
/// in or out, bound on attribute-disjointness, and keep the best benefit per
/// resulting partition count.
struct BbKnapsack {
    attribute_count: usize,
    /// All attributes, as a mask; also the weight capacity.
    capacity: u64,
    weights: Vec<u64>,
    benefits: Vec<f64>,
    count: u64,
    max_benefit: Vec<f64>,
    best_items: Vec<Option<BitSet>>,
}

impl BbKnapsack {
    fn new(attribute_count: usize, groups: &BTreeMap<u64, f64>) -> Self {
        let capacity = if attribute_count == 0 {
            0
        } else {
            (1u64 << attribute_count) - 1
        };
        BbKnapsack {
            attribute_count,
            capacity,
            weights: groups.keys().copied().collect(),
            benefits: groups.values().copied().collect(),
            count: 0,
            max_benefit: vec![0.0; attribute_count],
            best_items: vec![None; attribute_count],
        }
    }

    fn solve(&mut self) {
        self.search(0, 0.0, 0, 0, BitSet::new());
    }

    fn search(
        &mut self,
        i: usize,
        total_benefit: f64,
        total_weight: u64,
        bit_vector: u64,
        item_vector: BitSet,
    ) {
        if i == self.weights.len() {
            self.count += 1;

            let mut partition_count = item_vector.count_ones() as isize - 1;
            if total_weight < self.capacity {
                // uncovered attributes form an implicit extra partition
                partition_count += 1;
            }
            if partition_count >= 0 {
                let idx = partition_count as usize;
                if idx < self.max_benefit.len() && total_benefit > self.max_benefit[idx] {
                    self.max_benefit[idx] = total_benefit;
                    self.best_items[idx] = Some(item_vector);
                }
            }
            return;
        }

        self.search(
            i + 1,
            total_benefit,
            total_weight,
            bit_vector,
            item_vector.clone(),
        );
        let weight = self.weights[i];
        if total_weight + weight <= self.capacity && bit_vector & weight == 0 {
            self.search(
                i + 1,
                total_benefit + self.benefits[i],
                total_weight + weight,
                bit_vector | weight,
                item_vector.with_bit(i),
            );
        }
    }

    /// Candidate partitionings, one per partition count. Attributes no packed
    /// group covers stay in partition 0, groups are numbered from 1.
    fn item_partitions(&self) -> Vec<Option<Vec<usize>>> {
        self.best_items
            .iter()
            .map(|items| {
                items.as_ref().map(|items| {
                    let mut partitioning = row_layout(self.attribute_count);
                    let mut p = 0;
                    for item in items.iter_ones() {
                        p += 1;
                        for a in 0..self.attribute_count {
                            if self.weights[item] & (1u64 << a) != 0 {
                                partitioning[a] = p;
                            }
                        }
                    }
                    partitioning
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModelKind;
    use crate::workload::{RangeFilter, Table};

    fn two_query_table() -> Table {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);
        t
    }

    #[test]
    fn test_single_replica_beats_the_row_layout() {
        let config = AlgorithmConfig::new(two_query_table(), CostModelKind::Disk);
        let calculator = config.partitioning_calculator();

        let mut algo = TrojanLayout::new(config.clone()).unwrap();
        let Layout::Partitioning(partitioning) = algo.partition().unwrap() else {
            panic!("expected a partitioning");
        };

        assert_eq!(partitioning.len(), 4);
        assert!(partitioning.iter().all(|&p| p < 4));
        // the row layout is always among the evaluated candidates
        assert!(
            calculator.partitioning_cost(&partitioning)
                <= calculator.partitioning_cost(&row_layout(4))
        );
    }

    #[test]
    fn test_too_many_attributes_is_rejected() {
        let t = Table::simple(64, 1000);
        assert!(matches!(
            TrojanLayout::new(AlgorithmConfig::new(t, CostModelKind::Disk)),
            Err(AlgoError::TooManyAttributes { count: 64, max: 63 })
        ));
    }

    #[test]
    fn test_interestingness_prefers_co_accessed_pairs() {
        let mut t = Table::simple(3, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1, 2]);
        t.add_projection_query("q1", 1, vec![0, 1]);
        t.add_projection_query("q2", 1, vec![2]);
        let w = WorkloadSnapshot::of_table(&t);
        let intg = GroupInterestingness::new(&w);

        // attributes 0 and 1 always travel together, 0 and 2 only sometimes
        assert!(intg.of_group(0b011) > intg.of_group(0b101));
    }

    #[test]
    fn test_knapsack_packs_disjoint_groups() {
        let groups: BTreeMap<u64, f64> =
            [(0b0011u64, 1.0), (0b1100, 1.0), (0b0110, 0.9)].into_iter().collect();
        let mut solver = BbKnapsack::new(4, &groups);
        solver.solve();

        let candidates = solver.item_partitions();
        // two disjoint groups cover everything: [1, 1, 2, 2]
        assert_eq!(candidates[1], Some(vec![1, 1, 2, 2]));
    }

    #[test]
    fn test_replication_routes_queries_to_replicas() {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![0, 1]);
        t.add_projection_query("q2", 1, vec![2, 3]);
        t.add_projection_query("q3", 1, vec![2, 3]);

        let config = AlgorithmConfig::new(t, CostModelKind::Disk);
        let mut algo = TrojanLayout::new(config)
            .unwrap()
            .with_replication_factor(2);
        let Layout::Partitions { partitions, plan } = algo.partition().unwrap() else {
            panic!("expected a replicated layout");
        };

        assert_eq!(algo.per_replica_partitioning().len(), 2);
        assert_eq!(algo.query_grouping().len(), 4);
        let replicas: BTreeSet<usize> = algo.query_grouping().iter().copied().collect();
        assert_eq!(replicas.len(), 2);

        assert!(!partitions.is_empty());
        for q in 0..4 {
            assert!(!plan[&q].is_empty());
        }
    }

    #[test]
    fn test_mark_index_picks_most_selective_range_attribute() {
        let mut t = Table::simple(3, 1000);
        t.add_range_query(
            "q0",
            1,
            vec![0, 1],
            RangeFilter {
                attribute: 0,
                touched_rows: 900,
                indexed: false,
            },
        );
        t.add_range_query(
            "q1",
            1,
            vec![1, 2],
            RangeFilter {
                attribute: 1,
                touched_rows: 100,
                indexed: false,
            },
        );

        mark_index(&mut t, &[0, 1]);

        // attribute 1 skips more rows, so it carries the index
        let q0 = t.queries[0].range_filter.as_ref().unwrap();
        let q1 = t.queries[1].range_filter.as_ref().unwrap();
        assert!(!q0.indexed);
        assert!(q1.indexed);
    }
}

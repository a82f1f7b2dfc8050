use std::collections::BTreeSet;

use log::debug;

use crate::cost::PartitionsCostCalculator;
use crate::layout::PartitionsMap;

use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

type Fragment = BTreeSet<usize>;
type Solution = BTreeSet<Fragment>;

/// AutoPart (Papadomanolakis and Ailamaki, SSDBM 2004): bottom-up composition
/// of possibly overlapping partitions out of atomic fragments, under a
/// replication budget.
///
/// Atomic fragments are the finest attribute groups no query splits. Each
/// iteration grows composite fragments out of the previous selection, greedily
/// admits the ones that lower the workload cost while the replicated row stays
/// within the storage budget, and a final pass merges partition pairs that pay
/// off.
pub struct AutoPart {
    config: AlgorithmConfig,
    stats: SearchStats,
    calculator: Box<dyn PartitionsCostCalculator>,
    /// Storage allowed for replication, as a fraction of the original row
    /// size.
    replication_factor: f64,
    /// Minimal number of queries that must reference every attribute of a
    /// candidate fragment.
    query_extent_threshold: usize,
}

impl AutoPart {
    pub fn new(config: AlgorithmConfig) -> Self {
        let calculator = config.partitions_calculator();
        AutoPart {
            config,
            stats: SearchStats::default(),
            calculator,
            replication_factor: 0.5,
            query_extent_threshold: 1,
        }
    }

    pub fn with_replication_factor(mut self, replication_factor: f64) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_query_extent_threshold(mut self, threshold: usize) -> Self {
        self.query_extent_threshold = threshold;
        self
    }

    /// The finest fragments no query extent cuts through: fold each query
    /// extent into the set, splitting existing fragments into intersection
    /// and remainder.
    fn atomic_fragments(&self) -> Solution {
        let w = &self.config.w;
        let mut fragments = Solution::new();

        for q in 0..w.query_count {
            let mut extent: Fragment = w.query_access_set(q).into_iter().collect();

            let mut split = Solution::new();
            for fragment in &fragments {
                let intersection: Fragment = fragment.intersection(&extent).copied().collect();
                if intersection.is_empty() {
                    split.insert(fragment.clone());
                    continue;
                }

                let remainder: Fragment = fragment.difference(&intersection).copied().collect();
                if !remainder.is_empty() {
                    split.insert(remainder);
                }
                for a in &intersection {
                    extent.remove(a);
                }
                split.insert(intersection);
            }

            if !extent.is_empty() {
                split.insert(extent);
            }
            fragments = split;
        }

        fragments
    }

    /// Number of queries referencing every attribute of the fragment.
    fn query_extent(&self, fragment: &Fragment) -> usize {
        let w = &self.config.w;
        (0..w.query_count)
            .filter(|&q| fragment.iter().all(|&a| w.usage_matrix[q][a] == 1))
            .count()
    }

    /// Replicated row size of a set of possibly overlapping partitions.
    fn overlapping_size<'a>(&self, partitions: impl Iterator<Item = &'a Fragment>) -> u64 {
        let sizes = &self.config.w.attribute_sizes;
        partitions
            .flat_map(|partition| partition.iter())
            .map(|&a| u64::from(sizes[a]))
            .sum()
    }

    fn solution_cost(&self, solution: &Solution) -> f64 {
        self.calculator.find_partitions_cost(&partitions_map_of(solution)).0
    }
}

/// Insert a fragment, dropping every fragment it subsumes.
fn add_fragment(solution: &mut Solution, fragment: Fragment) {
    solution.retain(|existing| !existing.is_subset(&fragment));
    solution.insert(fragment);
}

fn partitions_map_of(solution: &Solution) -> PartitionsMap {
    solution
        .iter()
        .enumerate()
        .map(|(p, fragment)| (p, fragment.clone()))
        .collect()
}

impl VerticalPartitioner for AutoPart {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::AutoPart
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

        let unreferenced: Fragment = w.non_referenced_attributes().into_iter().collect();
        let unreferenced_size = self.overlapping_size(std::iter::once(&unreferenced));
        let budget = (1.0 + self.replication_factor) * f64::from(w.row_size);

        let atomics = self.atomic_fragments();
        debug!("autopart starts from {} atomic fragments", atomics.len());

        /* Iteration phase. */

        let mut present_solution = atomics.clone();
        let mut selected_curr = atomics.clone();
        let mut k = 0u64;

        loop {
            k += 1;

            // composite fragment generation
            let selected_prev = std::mem::take(&mut selected_curr);
            let mut candidates = Solution::new();
            for composite in &selected_prev {
                for atomic in &atomics {
                    let fragment: Fragment = composite.union(atomic).copied().collect();
                    if self.query_extent(&fragment) >= self.query_extent_threshold {
                        candidates.insert(fragment);
                    }
                }
                if k > 1 {
                    for other in &selected_prev {
                        let fragment: Fragment = composite.union(other).copied().collect();
                        if self.query_extent(&fragment) >= self.query_extent_threshold {
                            candidates.insert(fragment);
                        }
                    }
                }
            }

            // candidate fragment selection
            let mut best_cost = self.solution_cost(&present_solution);
            loop {
                let mut best: Option<(Solution, Fragment)> = None;
                for candidate in &candidates {
                    if present_solution.contains(candidate) {
                        continue;
                    }

                    let mut new_solution = present_solution.clone();
                    add_fragment(&mut new_solution, candidate.clone());

                    let new_size =
                        self.overlapping_size(new_solution.iter()) + unreferenced_size;
                    if new_size as f64 > budget {
                        continue;
                    }

                    let cost = self.solution_cost(&new_solution);
                    if cost < best_cost {
                        best_cost = cost;
                        best = Some((new_solution, candidate.clone()));
                    }
                }

                let Some((solution, selected)) = best else {
                    break;
                };
                present_solution = solution;
                candidates.remove(&selected);
                selected_curr.insert(selected);
            }

            if selected_curr.is_empty() {
                break;
            }
        }

        self.stats.iterations = k;

        /* Pairwise merge phase. */

        let mut best_cost = self.solution_cost(&present_solution);
        loop {
            let fragments: Vec<&Fragment> = present_solution.iter().collect();
            let mut best_merge: Option<(Fragment, Fragment)> = None;

            for i in 0..fragments.len() {
                for j in i + 1..fragments.len() {
                    let mut modified = present_solution.clone();
                    modified.remove(fragments[i]);
                    modified.remove(fragments[j]);
                    modified.insert(fragments[i].union(fragments[j]).copied().collect());

                    let cost = self.solution_cost(&modified);
                    if cost < best_cost {
                        best_cost = cost;
                        best_merge = Some((fragments[i].clone(), fragments[j].clone()));
                    }
                }
            }

            let Some((left, right)) = best_merge else {
                break;
            };
            let merged: Fragment = left.union(&right).copied().collect();
            present_solution.remove(&left);
            present_solution.remove(&right);
            present_solution.insert(merged);
        }

        if !unreferenced.is_empty() {
            present_solution.insert(unreferenced);
        }

        let partitions = partitions_map_of(&present_solution);
        let (_, plan) = self.calculator.find_partitions_cost(&partitions);

        Ok(Layout::Partitions { partitions, plan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModelKind;
    use crate::workload::Table;

    #[test]
    fn test_disjoint_queries_yield_disjoint_partitions() {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);

        let mut algo = AutoPart::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let Layout::Partitions { partitions, plan } = algo.partition().unwrap() else {
            panic!("expected overlapping partitions");
        };

        let groups: Vec<_> = partitions.values().cloned().collect();
        assert!(groups.contains(&BTreeSet::from([0, 1])));
        assert!(groups.contains(&BTreeSet::from([2, 3])));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_atomic_fragments_split_on_overlap() {
        let mut t = Table::simple(4, 1000);
        t.add_projection_query("q0", 1, vec![0, 1, 2]);
        t.add_projection_query("q1", 1, vec![1, 2, 3]);

        let algo = AutoPart::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let atomics = algo.atomic_fragments();

        let expected: Solution = [
            BTreeSet::from([0]),
            BTreeSet::from([1, 2]),
            BTreeSet::from([3]),
        ]
        .into_iter()
        .collect();
        assert_eq!(atomics, expected);
    }

    #[test]
    fn test_unreferenced_attributes_form_their_own_partition() {
        let mut t = Table::simple(3, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);

        let mut algo = AutoPart::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let Layout::Partitions { partitions, .. } = algo.partition().unwrap() else {
            panic!("expected overlapping partitions");
        };

        assert!(partitions.values().any(|p| *p == BTreeSet::from([2])));
    }

    #[test]
    fn test_every_attribute_is_covered() {
        let mut t = Table::simple(5, 100_000);
        t.add_projection_query("q0", 1, vec![0, 1, 2]);
        t.add_projection_query("q1", 2, vec![1, 2, 3]);
        t.add_projection_query("q2", 1, vec![4]);

        let mut algo = AutoPart::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let Layout::Partitions { partitions, .. } = algo.partition().unwrap() else {
            panic!("expected overlapping partitions");
        };

        let covered: BTreeSet<usize> = partitions.values().flatten().copied().collect();
        assert_eq!(covered, BTreeSet::from([0, 1, 2, 3, 4]));
    }
}

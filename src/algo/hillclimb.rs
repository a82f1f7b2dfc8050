use log::debug;

use crate::cost::PartitioningCostCalculator;
use crate::layout;

use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

/// Bottom-up greedy merging, after Hankins and Patel's Data Morphing.
///
/// Starts from the column layout and repeatedly applies the globally
/// cheapest pairwise merge until no merge lowers the workload cost. No cost
/// memoization table is kept; re-evaluating candidates is cheap compared to
/// the table the original algorithm would need for wide schemas.
pub struct HillClimb {
    config: AlgorithmConfig,
    stats: SearchStats,
    calculator: Box<dyn PartitioningCostCalculator>,
}

impl HillClimb {
    pub fn new(config: AlgorithmConfig) -> Self {
        let calculator = config.partitioning_calculator();
        HillClimb {
            config,
            stats: SearchStats::default(),
            calculator,
        }
    }

    fn merged_candidate(current: &[Vec<usize>], i: usize, j: usize) -> Vec<Vec<usize>> {
        let mut merged: Vec<usize> = current[i].iter().chain(&current[j]).copied().collect();
        merged.sort_unstable();

        let mut candidate = Vec::with_capacity(current.len() - 1);
        for (k, partition) in current.iter().enumerate() {
            if k == i {
                candidate.push(merged.clone());
            } else if k != j {
                candidate.push(partition.clone());
            }
        }
        candidate
    }
}

impl VerticalPartitioner for HillClimb {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::HillClimb
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
        let all_queries: Vec<usize> = (0..w.query_count).collect();

        let mut current: Vec<Vec<usize>> = (0..w.attribute_count).map(|a| vec![a]).collect();
        let mut current_cost = self.calculator.partitions_cost(&current, &all_queries);
        let mut rounds = 0u64;

        loop {
            rounds += 1;

            let mut best: Option<(Vec<Vec<usize>>, f64)> = None;
            for i in 0..current.len() {
                for j in i + 1..current.len() {
                    let candidate = Self::merged_candidate(&current, i, j);
                    let cost = self.calculator.partitions_cost(&candidate, &all_queries);
                    if best.as_ref().is_none_or(|(_, c)| cost < *c) {
                        best = Some((candidate, cost));
                    }
                }
            }

            match best {
                Some((candidate, cost)) if cost < current_cost => {
                    current = candidate;
                    current_cost = cost;
                }
                _ => break,
            }
        }

        self.stats.iterations = rounds;
        debug!(
            "hill climb settled on {} partitions after {rounds} rounds, cost {current_cost}",
            current.len()
        );

        Ok(Layout::Partitioning(layout::partitioning_of_partitions(
            &current,
            w.attribute_count,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModelKind;
    use crate::layout::consecutive_partition_ids;
    use crate::workload::Table;

    #[test]
    fn test_disjoint_queries_split_the_table() {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);

        let mut algo = HillClimb::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let layout = algo.partition().unwrap();

        let Layout::Partitioning(partitioning) = layout else {
            panic!("expected a partitioning");
        };
        assert_eq!(consecutive_partition_ids(&partitioning), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_query_for_all_attributes_yields_row_layout() {
        let mut t = Table::simple(3, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1, 2]);

        let mut algo = HillClimb::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let layout = algo.partition().unwrap();

        assert_eq!(layout, Layout::Partitioning(vec![0, 0, 0]));
    }

    #[test]
    fn test_empty_workload_yields_row_layout() {
        let t = Table::simple(3, 1000);
        let mut algo = HillClimb::new(AlgorithmConfig::new(t, CostModelKind::Disk));

        assert_eq!(algo.partition().unwrap(), Layout::Partitioning(vec![0, 0, 0]));
    }
}

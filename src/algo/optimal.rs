use log::debug;

use crate::cost::PartitioningCostCalculator;
use crate::layout::{consecutive_partition_ids, row_layout};

use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

/// Exhaustive search over all set partitions of the attributes, enumerated
/// with the Stirling recurrence (Bell number many candidates). Only feasible
/// for narrow tables, but yields the true optimum and serves as the baseline
/// the heuristics are measured against.
///
/// Unreferenced attributes are stripped before the enumeration and placed in
/// a partition of their own afterwards.
pub struct Optimal {
    config: AlgorithmConfig,
    stats: SearchStats,
}

impl Optimal {
    pub fn new(config: AlgorithmConfig) -> Self {
        Optimal {
            config,
            stats: SearchStats::default(),
        }
    }
}

impl VerticalPartitioner for Optimal {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Optimal
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
        let referenced = w.referenced_attributes(&all_queries);

        if referenced.is_empty() {
            return Ok(Layout::row(w.attribute_count));
        }

        // search only over the referenced attributes
        let reduced = self
            .config
            .with_table(self.config.table.partial(&referenced, &all_queries));
        let calculator = reduced.partitioning_calculator();

        let enumeration = BellEnumeration::new(calculator.as_ref(), reduced.w.attribute_count);
        let (subset_partitioning, iterations) = enumeration.run();
        self.stats.iterations = iterations;
        debug!("exhaustive search evaluated {iterations} partitionings");

        // unreferenced attributes stay in partition 0, shifting the rest up
        let shift = usize::from(referenced.len() < w.attribute_count);
        let mut partitioning = row_layout(w.attribute_count);
        for (i, &a) in referenced.iter().enumerate() {
            partitioning[a] = subset_partitioning[i] + shift;
        }

        Ok(Layout::Partitioning(consecutive_partition_ids(
            &partitioning,
        )))
    }
}

/// Enumerates every set partition of `n` elements exactly once, by walking
/// the Stirling recurrence for k = 1..=n parts.
struct BellEnumeration<'a> {
    calculator: &'a dyn PartitioningCostCalculator,
    n: usize,
    iterations: u64,
    min_cost: f64,
    best: Vec<usize>,
}

impl<'a> BellEnumeration<'a> {
    fn new(calculator: &'a dyn PartitioningCostCalculator, n: usize) -> Self {
        BellEnumeration {
            calculator,
            n,
            iterations: 0,
            min_cost: f64::MAX,
            best: row_layout(n),
        }
    }

    fn run(mut self) -> (Vec<usize>, u64) {
        let mut a = vec![0usize; self.n];
        for k in 1..=self.n {
            self.stirling(self.n, k, &mut a);
        }
        (self.best, self.iterations)
    }

    fn stirling(&mut self, n: usize, k: usize, a: &mut [usize]) {
        if k == 1 {
            a[..n].fill(0);
            self.consider(a);
            return;
        }
        if k == n {
            for (i, slot) in a[..k].iter_mut().enumerate() {
                *slot = i;
            }
            self.consider(a);
            return;
        }

        a[n - 1] = k - 1;
        self.stirling(n - 1, k - 1, a);
        for i in 0..k {
            a[n - 1] = i;
            self.stirling(n - 1, k, a);
        }
    }

    fn consider(&mut self, a: &[usize]) {
        self.iterations += 1;
        let partitioning = consecutive_partition_ids(a);
        let cost = self.calculator.partitioning_cost(&partitioning);
        if cost < self.min_cost {
            self.min_cost = cost;
            self.best = partitioning;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModelKind;
    use crate::workload::Table;

    #[test]
    fn test_disjoint_queries_split_the_table() {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);

        let mut algo = Optimal::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let layout = algo.partition().unwrap();

        assert_eq!(layout, Layout::Partitioning(vec![0, 0, 1, 1]));
    }

    #[test]
    fn test_enumeration_counts_bell_number_candidates() {
        let mut t = Table::simple(4, 1000);
        t.add_projection_query("q0", 1, vec![0, 1, 2, 3]);

        let mut algo = Optimal::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        algo.partition().unwrap();

        // B(4) = 15 set partitions
        assert_eq!(algo.stats().iterations, 15);
    }

    #[test]
    fn test_unreferenced_attribute_gets_its_own_partition() {
        let mut t = Table::simple(3, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 1]);

        let mut algo = Optimal::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let Layout::Partitioning(partitioning) = algo.partition().unwrap() else {
            panic!("expected a partitioning");
        };

        assert_eq!(partitioning[0], partitioning[1]);
        assert_ne!(partitioning[2], partitioning[0]);
    }
}

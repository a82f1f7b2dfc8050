use std::collections::BTreeSet;

use crate::layout::{PartitionsMap, SelectionPlan, map_of_partitioning, row_layout};

use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

/// One partition per query, holding exactly the attributes the query
/// references. Not a practical layout; it gives a lower bound on per-query
/// I/O cost to compare the real algorithms against.
pub struct DreamPartitioner {
    config: AlgorithmConfig,
    stats: SearchStats,
}

impl DreamPartitioner {
    pub fn new(config: AlgorithmConfig) -> Self {
        DreamPartitioner {
            config,
            stats: SearchStats::default(),
        }
    }
}

impl VerticalPartitioner for DreamPartitioner {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Dream
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

        let mut partitions = PartitionsMap::new();
        let mut plan = SelectionPlan::new();

        for q in 0..w.query_count {
            let partition: BTreeSet<usize> = w.query_access_set(q).into_iter().collect();
            partitions.insert(q, partition);
            plan.insert(q, BTreeSet::from([q]));
        }

        // attributes no query touches still need a home; no plan entry points
        // at their partition
        let unreferenced: BTreeSet<usize> = w.non_referenced_attributes().into_iter().collect();
        if !unreferenced.is_empty() {
            partitions.insert(w.query_count, unreferenced);
        }

        Ok(Layout::Partitions { partitions, plan })
    }

    fn empty_workload_layout(&self) -> Layout {
        Layout::Partitions {
            partitions: map_of_partitioning(&row_layout(self.config.w.attribute_count)),
            plan: SelectionPlan::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModelKind;
    use crate::workload::Table;

    #[test]
    fn test_one_partition_per_query() {
        let mut t = Table::simple(4, 1000);
        t.add_projection_query("q0", 1, vec![0, 2]);
        t.add_projection_query("q1", 1, vec![1, 2, 3]);

        let mut algo = DreamPartitioner::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let Layout::Partitions { partitions, plan } = algo.partition().unwrap() else {
            panic!("expected overlapping partitions");
        };

        assert_eq!(partitions[&0], BTreeSet::from([0, 2]));
        assert_eq!(partitions[&1], BTreeSet::from([1, 2, 3]));
        assert_eq!(plan[&0], BTreeSet::from([0]));
        assert_eq!(plan[&1], BTreeSet::from([1]));
    }

    #[test]
    fn test_unreferenced_attributes_get_their_own_partition() {
        let mut t = Table::simple(4, 1000);
        t.add_projection_query("q0", 1, vec![0, 1]);

        let mut algo = DreamPartitioner::new(AlgorithmConfig::new(t, CostModelKind::Disk));
        let Layout::Partitions { partitions, plan } = algo.partition().unwrap() else {
            panic!("expected overlapping partitions");
        };

        assert_eq!(partitions[&0], BTreeSet::from([0, 1]));
        assert_eq!(partitions[&1], BTreeSet::from([2, 3]));
        // the extra partition serves no query
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[&0], BTreeSet::from([0]));
    }
}

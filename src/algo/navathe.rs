use log::debug;

use crate::cost::PartitioningCostCalculator;
use crate::layout::consecutive_partition_ids;

use super::clustering::{self, SplitSearch};
use super::{AlgoError, AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner};

/// The classic two-phase vertical partitioning of Navathe, Ceri, Wiederhold
/// and Dou (TODS 1984): cluster the attribute affinity matrix with the bond
/// energy algorithm, then exhaustively try every split vector over the
/// resulting ordering.
///
/// The enumeration is exponential in the attribute count, but only over the
/// `2^(n-1)` consecutive splits of one ordering rather than all set
/// partitions.
pub struct Navathe {
    config: AlgorithmConfig,
    stats: SearchStats,
    calculator: Box<dyn PartitioningCostCalculator>,
}

impl Navathe {
    pub fn new(config: AlgorithmConfig) -> Self {
        let calculator = config.partitioning_calculator();
        Navathe {
            config,
            stats: SearchStats::default(),
            calculator,
        }
    }
}

impl VerticalPartitioner for Navathe {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Navathe
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
        debug!("bond energy ordering: {ordering:?}");
        if ordering.is_empty() {
            return Ok(Layout::Partitioning(Vec::new()));
        }

        let mut search = SplitSearch::new(self.calculator.as_ref(), &ordering);
        let mut split = vec![0u8; ordering.len().saturating_sub(1)];
        enumerate_splits(&mut search, 0, ordering.len() - 1, &mut split);

        let (best, iterations) = search.into_best();
        self.stats.iterations = iterations;

        Ok(Layout::Partitioning(consecutive_partition_ids(&best)))
    }
}

/// Try every combination of splits at ordering positions `x..y`, leaving the
/// rest of the split vector untouched. Candidates are costed at the leaves.
pub(crate) fn enumerate_splits(search: &mut SplitSearch<'_>, x: usize, y: usize, split: &mut [u8]) {
    for i in x..=y {
        for s in &mut split[x..i] {
            *s = 0;
        }
        if i < y {
            split[i] = 1;
            enumerate_splits(search, i + 1, y, split);
        } else {
            search.evaluate(split);
        }
    }
}

//! Vertical partitioning search algorithms.
//!
//! Every algorithm consumes an [`AlgorithmConfig`] and produces a [`Layout`]:
//! either a non-overlapping partitioning (one partition id per attribute) or
//! a set of possibly overlapping partitions together with the selection plan
//! routing each query to the partitions it reads.

pub mod autopart;
pub mod clustering;
pub mod dream;
pub mod error;
pub mod graph;
pub mod hillclimb;
pub mod hyrise;
pub mod navathe;
pub mod o2p;
pub mod optimal;
pub mod trojan;

pub use autopart::AutoPart;
pub use dream::DreamPartitioner;
pub use error::AlgoError;
pub use graph::{GraphPartitioner, MetisPartitioner};
pub use hillclimb::HillClimb;
pub use hyrise::Hyrise;
pub use navathe::Navathe;
pub use o2p::{O2p, O2pMode};
pub use optimal::Optimal;
pub use trojan::TrojanLayout;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cost::{
    CostModelKind, DiskParams, PartitioningCostCalculator, PartitionsCostCalculator,
    create_partitioning_calculator, create_partitions_calculator,
};
use crate::layout::{self, PartitionsMap, SelectionPlan};
use crate::workload::{Table, WorkloadSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmKind {
    AutoPart,
    HillClimb,
    Hyrise,
    Navathe,
    O2p,
    Optimal,
    Trojan,
    Dream,
}

/// Everything an algorithm needs to run: the table, an immutable snapshot of
/// its workload and the cost model selection. Configs are cheap to clone and
/// derived configs (for a reduced table or a transformed snapshot) never
/// touch the original.
#[derive(Debug, Clone)]
pub struct AlgorithmConfig {
    pub table: Table,
    pub w: WorkloadSnapshot,
    pub cost_model: CostModelKind,
    pub disk: DiskParams,
}

impl AlgorithmConfig {
    pub fn new(table: Table, cost_model: CostModelKind) -> Self {
        let w = WorkloadSnapshot::of_table(&table);
        AlgorithmConfig {
            table,
            w,
            cost_model,
            disk: DiskParams::default(),
        }
    }

    /// Derived config for a different table, with the snapshot rebuilt.
    pub fn with_table(&self, table: Table) -> Self {
        let w = WorkloadSnapshot::of_table(&table);
        AlgorithmConfig {
            table,
            w,
            cost_model: self.cost_model,
            disk: self.disk,
        }
    }

    /// Derived config for an already transformed snapshot.
    pub fn with_snapshot(&self, w: WorkloadSnapshot) -> Self {
        AlgorithmConfig {
            table: self.table.clone(),
            w,
            cost_model: self.cost_model,
            disk: self.disk,
        }
    }

    pub fn partitioning_calculator(&self) -> Box<dyn PartitioningCostCalculator> {
        create_partitioning_calculator(self.cost_model, &self.w, self.disk)
    }

    pub fn partitions_calculator(&self) -> Box<dyn PartitionsCostCalculator> {
        create_partitions_calculator(self.cost_model, &self.w, self.disk)
    }
}

/// Search effort counters plus the wall-clock time of the last run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Number of elements of the candidate set the algorithm considered.
    pub candidate_set_size: u64,
    pub iterations: u64,
    pub elapsed: Duration,
}

/// The result of a partitioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Layout {
    /// Non-overlapping layout, one partition id per attribute.
    Partitioning(Vec<usize>),
    /// Possibly overlapping partitions with the per-query selection plan.
    Partitions {
        partitions: PartitionsMap,
        plan: SelectionPlan,
    },
}

impl Layout {
    pub fn row(attribute_count: usize) -> Layout {
        Layout::Partitioning(layout::row_layout(attribute_count))
    }

    /// The most general view of the layout.
    pub fn partitions_map(&self) -> PartitionsMap {
        match self {
            Layout::Partitioning(partitioning) => layout::map_of_partitioning(partitioning),
            Layout::Partitions { partitions, .. } => partitions.clone(),
        }
    }

    pub fn as_partitioning(&self) -> Option<&[usize]> {
        match self {
            Layout::Partitioning(partitioning) => Some(partitioning),
            Layout::Partitions { .. } => None,
        }
    }
}

/// A vertical partitioning algorithm.
///
/// [`partition`] is the entry point: it handles the empty workload, delegates
/// the search to [`do_partition`] and records the elapsed time. With no
/// queries to optimize for, every algorithm degenerates to the row layout.
///
/// [`partition`]: VerticalPartitioner::partition
/// [`do_partition`]: VerticalPartitioner::do_partition
pub trait VerticalPartitioner {
    fn kind(&self) -> AlgorithmKind;

    fn config(&self) -> &AlgorithmConfig;

    fn stats(&self) -> &SearchStats;

    fn stats_mut(&mut self) -> &mut SearchStats;

    /// Run the search. Only called on workloads with at least one query.
    fn do_partition(&mut self) -> Result<Layout, AlgoError>;

    fn partition(&mut self) -> Result<Layout, AlgoError> {
        let started = Instant::now();

        let layout = if self.config().w.query_count == 0 {
            self.empty_workload_layout()
        } else {
            self.do_partition()?
        };

        self.stats_mut().elapsed = started.elapsed();
        Ok(layout)
    }

    /// Layout returned for a workload without queries.
    fn empty_workload_layout(&self) -> Layout {
        Layout::row(self.config().w.attribute_count)
    }
}

pub fn create_algorithm(
    kind: AlgorithmKind,
    config: AlgorithmConfig,
) -> Result<Box<dyn VerticalPartitioner>, AlgoError> {
    Ok(match kind {
        AlgorithmKind::AutoPart => Box::new(AutoPart::new(config)),
        AlgorithmKind::HillClimb => Box::new(HillClimb::new(config)),
        AlgorithmKind::Hyrise => Box::new(Hyrise::new(config)),
        AlgorithmKind::Navathe => Box::new(Navathe::new(config)),
        AlgorithmKind::O2p => Box::new(O2p::new(config)),
        AlgorithmKind::Optimal => Box::new(Optimal::new(config)),
        AlgorithmKind::Trojan => Box::new(TrojanLayout::new(config)?),
        AlgorithmKind::Dream => Box::new(DreamPartitioner::new(config)),
    })
}

//! I/O and cache cost models, plus the calculators that aggregate them over
//! whole layouts.
//!
//! Two calculator families exist: [`PartitioningCostCalculator`] for
//! non-overlapping layouts given as one partition id per attribute, and
//! [`PartitionsCostCalculator`] for possibly overlapping partition maps,
//! which additionally solves for the cheapest partition-selection plan per
//! query.

pub mod disk;
pub mod memory;
pub mod partitioning;
pub mod partitions;
pub mod profiler;

pub use disk::{DiskCostModel, DiskParams};
pub use memory::{CACHE_LINE_WIDTH, MemCostModel};
pub use partitioning::{PartitioningCostCalculator, create_partitioning_calculator};
pub use partitions::{PartitionsCostCalculator, create_partitions_calculator};
pub use profiler::{PartitioningProfiler, PartitionsProfiler};

use serde::{Deserialize, Serialize};

/// Which cost model drives the optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostModelKind {
    /// Seek plus scan time of a spinning disk.
    Disk,
    /// Disk model that may skip blocks based on query selectivity.
    DiskSelectivity,
    /// Main-memory cache misses.
    Mem,
}

/// A cost split into its seek and scan components. The main-memory model
/// reports all of its cost as scan.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IoCost {
    pub seek: f64,
    pub scan: f64,
}

impl IoCost {
    pub fn total(&self) -> f64 {
        self.seek + self.scan
    }
}

impl std::ops::AddAssign for IoCost {
    fn add_assign(&mut self, rhs: IoCost) {
        self.seek += rhs.seek;
        self.scan += rhs.scan;
    }
}

// Vertical partitioning layout optimizer
//
// Given a table and a representative query workload, the algorithms in this
// crate decide how to group the table's attributes into physical partitions
// so that the estimated I/O cost of the workload is minimized, optionally
// replicating attributes across overlapping partitions.

pub mod algo;
pub mod common;
pub mod cost;
pub mod layout;
pub mod workload;

// Re-export key items for convenient access
pub use algo::{AlgorithmConfig, AlgorithmKind, Layout, SearchStats, VerticalPartitioner, create_algorithm};
pub use cost::CostModelKind;
pub use layout::{LayoutError, PartitionsMap, SelectionPlan};
pub use workload::{Attribute, Query, Table, WorkloadSnapshot};

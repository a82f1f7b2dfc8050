//! Layout representations and conversions.
//!
//! A non-overlapping layout is a *partitioning*: one partition id per
//! attribute. An overlapping layout is a [`PartitionsMap`] from partition id
//! to attribute set, in which an attribute may appear more than once; such a
//! layout is paired with a [`SelectionPlan`] recording which partitions each
//! query reads.

pub mod error;
pub mod partitioning;

pub use error::LayoutError;
pub use partitioning::{
    PartitionsMap, SelectionPlan, column_layout, consecutive_partition_ids, from_split_vector,
    map_of_partitioning, partitioning_of_map, partitioning_of_partitions, partitions_of,
    row_layout,
};

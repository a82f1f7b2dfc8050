use thiserror::Error;

use crate::layout::LayoutError;

use super::graph::GraphPartitionError;

#[derive(Debug, Error)]
pub enum AlgoError {
    /// Candidate column groups are enumerated as 64-bit masks, which bounds
    /// the table width the enumeration can handle.
    #[error("table has {count} attributes, the candidate enumeration supports at most {max}")]
    TooManyAttributes { count: usize, max: usize },

    #[error("graph partitioning failed")]
    Graph(#[from] GraphPartitionError),

    #[error("invalid layout")]
    Layout(#[from] LayoutError),
}

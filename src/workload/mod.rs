//! Workload data model: attributes, queries, tables and the immutable
//! snapshot consumed by the cost calculators and search algorithms.

pub mod attribute;
pub mod query;
pub mod snapshot;
pub mod table;

pub use attribute::Attribute;
pub use query::{Query, RangeFilter};
pub use snapshot::WorkloadSnapshot;
pub use table::Table;

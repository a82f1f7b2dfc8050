use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    /// An overlapping layout was handed to a conversion that requires each
    /// attribute to live in exactly one partition.
    #[error("attribute {attribute} belongs to more than one partition")]
    OverlappingPartitioning { attribute: usize },

    /// An attribute is covered by no partition of the layout.
    #[error("attribute {attribute} is not covered by any partition")]
    UncoveredAttribute { attribute: usize },
}

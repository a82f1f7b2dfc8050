use std::collections::{BTreeMap, BTreeSet};

use super::error::LayoutError;

/// Overlapping layout: partition id to the set of attributes it stores.
pub type PartitionsMap = BTreeMap<usize, BTreeSet<usize>>;

/// Query id to the set of partition ids the query reads.
pub type SelectionPlan = BTreeMap<usize, BTreeSet<usize>>;

/// All attributes in one partition.
pub fn row_layout(attribute_count: usize) -> Vec<usize> {
    vec![0; attribute_count]
}

/// One partition per attribute.
pub fn column_layout(attribute_count: usize) -> Vec<usize> {
    (0..attribute_count).collect()
}

/// Explode a partitioning into per-partition attribute lists. Slot `p` holds
/// the attributes of partition `p`; partition ids without attributes come out
/// as empty lists.
pub fn partitions_of(partitioning: &[usize]) -> Vec<Vec<usize>> {
    let slots = partitioning.iter().max().map_or(0, |&p| p + 1);
    let mut partitions = vec![Vec::new(); slots];
    for (attribute, &p) in partitioning.iter().enumerate() {
        partitions[p].push(attribute);
    }
    partitions
}

/// Inverse of [`partitions_of`]. Fails if an attribute appears in more than
/// one partition or in none.
pub fn partitioning_of_partitions(
    partitions: &[Vec<usize>],
    attribute_count: usize,
) -> Result<Vec<usize>, LayoutError> {
    let mut partitioning = vec![usize::MAX; attribute_count];
    for (p, attributes) in partitions.iter().enumerate() {
        for &attribute in attributes {
            if partitioning[attribute] != usize::MAX {
                return Err(LayoutError::OverlappingPartitioning { attribute });
            }
            partitioning[attribute] = p;
        }
    }
    if let Some(attribute) = partitioning.iter().position(|&p| p == usize::MAX) {
        return Err(LayoutError::UncoveredAttribute { attribute });
    }
    Ok(partitioning)
}

/// Collapse a partitions map into a partitioning. Fails on overlap.
pub fn partitioning_of_map(
    map: &PartitionsMap,
    attribute_count: usize,
) -> Result<Vec<usize>, LayoutError> {
    let mut partitioning = vec![usize::MAX; attribute_count];
    for (&p, attributes) in map {
        for &attribute in attributes {
            if partitioning[attribute] != usize::MAX {
                return Err(LayoutError::OverlappingPartitioning { attribute });
            }
            partitioning[attribute] = p;
        }
    }
    if let Some(attribute) = partitioning.iter().position(|&p| p == usize::MAX) {
        return Err(LayoutError::UncoveredAttribute { attribute });
    }
    Ok(partitioning)
}

/// Lift a partitioning into a partitions map, dropping empty partition ids.
pub fn map_of_partitioning(partitioning: &[usize]) -> PartitionsMap {
    let mut map = PartitionsMap::new();
    for (attribute, &p) in partitioning.iter().enumerate() {
        map.entry(p).or_default().insert(attribute);
    }
    map
}

/// Renumber partition ids into 0..k in order of first appearance, so that two
/// partitionings describing the same grouping compare equal.
pub fn consecutive_partition_ids(partitioning: &[usize]) -> Vec<usize> {
    let mut remap: BTreeMap<usize, usize> = BTreeMap::new();
    let mut next = 0;
    partitioning
        .iter()
        .map(|&p| {
            *remap.entry(p).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

/// Build a partitioning from a split vector over an attribute ordering.
/// `split[i] == 1` opens a new partition between ordering positions `i` and
/// `i + 1`; the split vector has one entry fewer than the ordering.
pub fn from_split_vector(split: &[u8], ordering: &[usize]) -> Vec<usize> {
    let mut partitioning = vec![0; ordering.len()];
    let mut p = 0;
    for (pos, &attribute) in ordering.iter().enumerate() {
        if pos > 0 && split[pos - 1] == 1 {
            p += 1;
        }
        partitioning[attribute] = p;
    }
    partitioning
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_roundtrip() {
        let partitioning = vec![0, 0, 1, 2, 1];
        let partitions = partitions_of(&partitioning);
        assert_eq!(partitions, vec![vec![0, 1], vec![2, 4], vec![3]]);
        assert_eq!(
            partitioning_of_partitions(&partitions, 5).unwrap(),
            partitioning
        );
    }

    #[test]
    fn test_overlap_is_rejected() {
        let partitions = vec![vec![0, 1], vec![1, 2]];
        assert!(matches!(
            partitioning_of_partitions(&partitions, 3),
            Err(LayoutError::OverlappingPartitioning { attribute: 1 })
        ));
    }

    #[test]
    fn test_uncovered_attribute_is_rejected() {
        let partitions = vec![vec![0], vec![2]];
        assert!(matches!(
            partitioning_of_partitions(&partitions, 3),
            Err(LayoutError::UncoveredAttribute { attribute: 1 })
        ));
    }

    #[test]
    fn test_consecutive_partition_ids() {
        assert_eq!(consecutive_partition_ids(&[5, 5, 2, 7, 2]), vec![0, 0, 1, 2, 1]);
        assert_eq!(consecutive_partition_ids(&[0, 1, 2]), vec![0, 1, 2]);
    }

    #[test]
    fn test_from_split_vector() {
        // ordering (2, 0, 1, 3), splits after positions 0 and 2
        let partitioning = from_split_vector(&[1, 0, 1], &[2, 0, 1, 3]);
        assert_eq!(partitioning, vec![1, 1, 0, 2]);
    }

    #[test]
    fn test_row_and_column_layouts() {
        assert_eq!(row_layout(3), vec![0, 0, 0]);
        assert_eq!(column_layout(3), vec![0, 1, 2]);
    }
}

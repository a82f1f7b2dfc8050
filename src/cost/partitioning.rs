use crate::layout::partitions_of;
use crate::workload::WorkloadSnapshot;

use super::disk::{DiskCostModel, DiskParams};
use super::memory::MemCostModel;
use super::{CostModelKind, IoCost};

/// Workload cost of a non-overlapping layout, given as one partition id per
/// attribute or as explicit per-partition attribute lists.
pub trait PartitioningCostCalculator {
    fn workload(&self) -> &WorkloadSnapshot;

    /// Sum of the per-query seek and scan costs imposed by the partitions.
    fn partitions_costs(&self, partitions: &[Vec<usize>], queries: &[usize]) -> IoCost;

    fn partitions_cost(&self, partitions: &[Vec<usize>], queries: &[usize]) -> f64 {
        self.partitions_costs(partitions, queries).total()
    }

    /// Total workload cost of a partitioning.
    fn partitioning_cost(&self, partitioning: &[usize]) -> f64 {
        self.partitions_cost(&partitions_of(partitioning), &self.all_queries())
    }

    fn partitioning_costs(&self, partitioning: &[usize]) -> IoCost {
        self.partitions_costs(&partitions_of(partitioning), &self.all_queries())
    }

    /// Cost of reading every partition of the current layout and writing
    /// every partition of the new one. Zero for models without a write path.
    fn layout_creation_cost(&self, _source: &[usize], _target: &[usize]) -> f64 {
        0.0
    }

    /// Cost of populating the new layout with rows streamed from a flat file.
    fn layout_load_cost(&self, _target: &[usize]) -> f64 {
        0.0
    }

    fn all_queries(&self) -> Vec<usize> {
        (0..self.workload().query_count).collect()
    }
}

fn partition_row_sizes(w: &WorkloadSnapshot, partitions: &[Vec<usize>]) -> Vec<u32> {
    partitions
        .iter()
        .map(|p| p.iter().map(|&a| w.attribute_sizes[a]).sum())
        .collect()
}

/// Row sizes of the partitions a query references, and their sum.
fn referenced_row_sizes(
    w: &WorkloadSnapshot,
    partitions: &[Vec<usize>],
    row_sizes: &[u32],
    query: usize,
) -> (Vec<bool>, u32) {
    let mut is_referenced = vec![false; partitions.len()];
    let mut referenced_row_size = 0;

    for (p, partition) in partitions.iter().enumerate() {
        if partition.iter().any(|&a| w.usage_matrix[query][a] == 1) {
            is_referenced[p] = true;
            referenced_row_size += row_sizes[p];
        }
    }

    (is_referenced, referenced_row_size)
}

/// Disk seek and scan time, reading referenced partitions in full.
pub struct DiskPartitioningCalculator {
    w: WorkloadSnapshot,
    cm: DiskCostModel,
}

impl DiskPartitioningCalculator {
    pub fn new(w: &WorkloadSnapshot, cm: DiskCostModel) -> Self {
        DiskPartitioningCalculator { w: w.clone(), cm }
    }
}

impl PartitioningCostCalculator for DiskPartitioningCalculator {
    fn workload(&self) -> &WorkloadSnapshot {
        &self.w
    }

    fn partitions_costs(&self, partitions: &[Vec<usize>], queries: &[usize]) -> IoCost {
        let row_sizes = partition_row_sizes(&self.w, partitions);
        let mut total = IoCost::default();

        for &q in queries {
            let (is_referenced, referenced_row_size) =
                referenced_row_sizes(&self.w, partitions, &row_sizes, q);

            for p in 0..partitions.len() {
                if is_referenced[p] {
                    total += self.cm.costs(row_sizes[p], referenced_row_size);
                }
            }
        }

        total
    }

    fn layout_creation_cost(&self, source: &[usize], target: &[usize]) -> f64 {
        let mut cost = 0.0;

        let source_partitions = partitions_of(source);
        let row_sizes = partition_row_sizes(&self.w, &source_partitions);
        let total_row_size: u32 = row_sizes.iter().sum();
        for &row_size in &row_sizes {
            cost += self.cm.cost(row_size, total_row_size);
        }

        let target_partitions = partitions_of(target);
        let row_sizes = partition_row_sizes(&self.w, &target_partitions);
        let total_row_size: u32 = row_sizes.iter().sum();
        let write_cm = self.cm.for_writing();
        for &row_size in &row_sizes {
            cost += write_cm.cost(row_size, total_row_size);
        }

        cost
    }

    fn layout_load_cost(&self, target: &[usize]) -> f64 {
        let target_partitions = partitions_of(target);
        let row_sizes = partition_row_sizes(&self.w, &target_partitions);
        let total_row_size: u32 = row_sizes.iter().sum();

        // the file is read through a buffer holding 1M full rows
        let read_cm = self.cm.with_buffer_size(1_000_000 * total_row_size as u64);
        let mut cost = read_cm.cost(total_row_size, total_row_size);

        let write_cm = self.cm.for_writing();
        for &row_size in &row_sizes {
            cost += write_cm.cost(row_size, total_row_size);
        }

        cost
    }
}

/// Disk model that skips blocks when a query's selectivity permits reading
/// only a fraction of a partition.
pub struct SelectivityDiskPartitioningCalculator {
    w: WorkloadSnapshot,
    cm: DiskCostModel,
}

impl SelectivityDiskPartitioningCalculator {
    pub fn new(w: &WorkloadSnapshot, cm: DiskCostModel) -> Self {
        SelectivityDiskPartitioningCalculator { w: w.clone(), cm }
    }

    /// Fraction of the partition's blocks a query has to read. Partitions
    /// holding the query's filter columns are always scanned in full.
    fn ratio_of_blocks_to_read(&self, partition: &[usize], row_size: u32, query: usize) -> f64 {
        if partition
            .iter()
            .any(|a| self.w.selectivity_columns[query].contains(a))
        {
            return 1.0;
        }

        let rows_per_block = self.cm.params.block_size / row_size as u64;
        if rows_per_block == 0 {
            return 1.0;
        }

        // a filter matching no rows still pays for one block
        let selectivity = self.w.selectivities[query];
        if selectivity <= 0.0 {
            let blocks = self.w.num_rows.div_ceil(rows_per_block).max(1);
            return 1.0 / blocks as f64;
        }

        // a jump beyond the table means at most one qualifying row per scan
        let jump = ((1.0 / selectivity) as u64).min(self.w.num_rows.max(rows_per_block));
        if jump < rows_per_block {
            // no block can be skipped
            return 1.0;
        }

        // walk the qualifying row ids until they align with a block boundary
        let mut current_position = 0u64;
        let mut read_blocks = 0u64;
        loop {
            current_position = match current_position.checked_add(jump) {
                Some(position) => position,
                None => return 1.0,
            };
            read_blocks += 1;
            if current_position % rows_per_block == 0 {
                break;
            }
        }

        read_blocks as f64 / (current_position / rows_per_block) as f64
    }
}

impl PartitioningCostCalculator for SelectivityDiskPartitioningCalculator {
    fn workload(&self) -> &WorkloadSnapshot {
        &self.w
    }

    fn partitions_costs(&self, partitions: &[Vec<usize>], queries: &[usize]) -> IoCost {
        let row_sizes = partition_row_sizes(&self.w, partitions);
        let mut total = IoCost::default();

        for &q in queries {
            let (is_referenced, referenced_row_size) =
                referenced_row_sizes(&self.w, partitions, &row_sizes, q);

            for p in 0..partitions.len() {
                if !is_referenced[p] {
                    continue;
                }

                let full_scan = self.cm.costs(row_sizes[p], referenced_row_size);
                let ratio = self.ratio_of_blocks_to_read(&partitions[p], row_sizes[p], q);

                if ratio < 1.0 {
                    let selective =
                        self.cm
                            .costs_with_ratio(row_sizes[p], referenced_row_size, ratio);
                    if selective.total() < full_scan.total() {
                        total += selective;
                        continue;
                    }
                }

                total += full_scan;
            }
        }

        total
    }

    fn layout_creation_cost(&self, source: &[usize], target: &[usize]) -> f64 {
        DiskPartitioningCalculator::new(&self.w, self.cm).layout_creation_cost(source, target)
    }

    fn layout_load_cost(&self, target: &[usize]) -> f64 {
        DiskPartitioningCalculator::new(&self.w, self.cm).layout_load_cost(target)
    }
}

/// Cache misses of every query against every partition it references.
pub struct MemPartitioningCalculator {
    w: WorkloadSnapshot,
    cm: MemCostModel,
}

impl MemPartitioningCalculator {
    pub fn new(w: &WorkloadSnapshot) -> Self {
        MemPartitioningCalculator {
            w: w.clone(),
            cm: MemCostModel::new(w),
        }
    }
}

impl PartitioningCostCalculator for MemPartitioningCalculator {
    fn workload(&self) -> &WorkloadSnapshot {
        &self.w
    }

    fn partitions_costs(&self, partitions: &[Vec<usize>], queries: &[usize]) -> IoCost {
        let mut misses = 0u64;
        for partition in partitions {
            for &q in queries {
                misses += self.cm.cache_misses(partition, q);
            }
        }

        IoCost {
            seek: 0.0,
            scan: misses as f64,
        }
    }
}

pub fn create_partitioning_calculator(
    kind: CostModelKind,
    w: &WorkloadSnapshot,
    params: DiskParams,
) -> Box<dyn PartitioningCostCalculator> {
    let cm = DiskCostModel::new(params, w.num_rows);
    match kind {
        CostModelKind::Disk => Box::new(DiskPartitioningCalculator::new(w, cm)),
        CostModelKind::DiskSelectivity => {
            Box::new(SelectivityDiskPartitioningCalculator::new(w, cm))
        }
        CostModelKind::Mem => Box::new(MemPartitioningCalculator::new(w)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{column_layout, row_layout};
    use crate::workload::Table;

    fn narrow_queries_snapshot() -> WorkloadSnapshot {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0]);
        t.add_projection_query("q1", 1, vec![3]);
        WorkloadSnapshot::of_table(&t)
    }

    #[test]
    fn test_column_layout_beats_row_layout_for_narrow_queries() {
        let w = narrow_queries_snapshot();
        let calc = create_partitioning_calculator(CostModelKind::Disk, &w, DiskParams::default());

        let row = calc.partitioning_cost(&row_layout(4));
        let column = calc.partitioning_cost(&column_layout(4));
        assert!(column < row);
    }

    #[test]
    fn test_selectivity_never_costs_more_than_full_scan() {
        let mut t = Table::simple(4, 1_000_000);
        t.add_filtered_query("q0", 1, vec![0, 1], vec![0], 0.0001);
        let w = WorkloadSnapshot::of_table(&t);

        let full = create_partitioning_calculator(CostModelKind::Disk, &w, DiskParams::default());
        let selective =
            create_partitioning_calculator(CostModelKind::DiskSelectivity, &w, DiskParams::default());

        let layout = vec![0, 0, 1, 1];
        assert!(selective.partitioning_cost(&layout) <= full.partitioning_cost(&layout));
    }

    #[test]
    fn test_layout_creation_cost_is_positive() {
        let w = narrow_queries_snapshot();
        let calc = create_partitioning_calculator(CostModelKind::Disk, &w, DiskParams::default());

        assert!(calc.layout_creation_cost(&row_layout(4), &column_layout(4)) > 0.0);
        assert!(calc.layout_load_cost(&column_layout(4)) > 0.0);
    }

    #[test]
    fn test_mem_model_prefers_column_layout() {
        let w = narrow_queries_snapshot();
        let calc = create_partitioning_calculator(CostModelKind::Mem, &w, DiskParams::default());

        let row = calc.partitioning_cost(&row_layout(4));
        let column = calc.partitioning_cost(&column_layout(4));
        assert!(column < row);
        assert_eq!(calc.partitioning_costs(&column_layout(4)).seek, 0.0);
    }
}

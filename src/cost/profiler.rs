use crate::layout::{PartitionsMap, SelectionPlan, partitions_of};
use crate::workload::WorkloadSnapshot;

/// Size of the data every query needs per row, in bytes.
pub fn referenced_data_size_per_row(w: &WorkloadSnapshot) -> u64 {
    let mut total = 0u64;
    for q in 0..w.query_count {
        for a in 0..w.attribute_count {
            if w.usage_matrix[q][a] == 1 {
                total += w.attribute_sizes[a] as u64;
            }
        }
    }
    total
}

/// Cost-model independent metrics of a non-overlapping layout: redundant
/// bytes read and the tuple reconstruction joins a layout forces.
pub struct PartitioningProfiler {
    w: WorkloadSnapshot,
}

impl PartitioningProfiler {
    pub fn new(w: &WorkloadSnapshot) -> Self {
        PartitioningProfiler { w: w.clone() }
    }

    pub fn table_size(&self) -> u64 {
        self.w.row_size as u64 * self.w.num_rows
    }

    /// Bytes of non-referenced attributes read per row because they share a
    /// partition with referenced ones, over the given queries.
    pub fn redundant_bytes_read_per_row(&self, partitioning: &[usize], queries: &[usize]) -> u64 {
        let partitions = partitions_of(partitioning);
        let mut redundant = 0u64;

        for &q in queries {
            let referenced_partitions: std::collections::BTreeSet<usize> = (0..self
                .w
                .attribute_count)
                .filter(|&a| self.w.usage_matrix[q][a] == 1)
                .map(|a| partitioning[a])
                .collect();

            for p in referenced_partitions {
                for &a in &partitions[p] {
                    if self.w.usage_matrix[q][a] == 0 {
                        redundant += self.w.attribute_sizes[a] as u64;
                    }
                }
            }
        }

        redundant
    }

    pub fn redundant_bytes_read_per_table(&self, partitioning: &[usize]) -> u64 {
        self.redundant_bytes_read_per_row(partitioning, &self.all_queries()) * self.w.num_rows
    }

    pub fn total_data_read(&self, partitioning: &[usize]) -> u64 {
        let redundant = self.redundant_bytes_read_per_row(partitioning, &self.all_queries());
        let useful = referenced_data_size_per_row(&self.w);
        (useful + redundant) * self.w.num_rows
    }

    pub fn fraction_of_redundant_bytes_read(&self, partitioning: &[usize]) -> f64 {
        let redundant = self.redundant_bytes_read_per_row(partitioning, &self.all_queries()) as f64;
        let useful = referenced_data_size_per_row(&self.w) as f64;
        if useful + redundant == 0.0 {
            // nothing read at all, nothing redundant
            return 0.0;
        }
        redundant / (useful + redundant)
    }

    /// Number of extra joins needed per row to reconstruct tuples, over the
    /// given queries. A query touching k partitions needs k - 1 joins.
    pub fn attribute_joins_per_row(&self, partitioning: &[usize], queries: &[usize]) -> u64 {
        let mut joins = 0u64;

        for &q in queries {
            let referenced_partitions: std::collections::BTreeSet<usize> = (0..self
                .w
                .attribute_count)
                .filter(|&a| self.w.usage_matrix[q][a] == 1)
                .map(|a| partitioning[a])
                .collect();

            joins += referenced_partitions.len().saturating_sub(1) as u64;
        }

        joins
    }

    pub fn attribute_joins_per_table(&self, partitioning: &[usize]) -> u64 {
        self.attribute_joins_per_row(partitioning, &self.all_queries()) * self.w.num_rows
    }

    pub fn average_attribute_joins(&self, partitioning: &[usize]) -> f64 {
        self.attribute_joins_per_row(partitioning, &self.all_queries()) as f64
            / self.w.query_count as f64
    }

    fn all_queries(&self) -> Vec<usize> {
        (0..self.w.query_count).collect()
    }
}

/// The same metrics for possibly overlapping layouts, driven by the
/// selection plan instead of attribute membership.
pub struct PartitionsProfiler {
    w: WorkloadSnapshot,
}

impl PartitionsProfiler {
    pub fn new(w: &WorkloadSnapshot) -> Self {
        PartitionsProfiler { w: w.clone() }
    }

    pub fn table_size(&self) -> u64 {
        self.w.row_size as u64 * self.w.num_rows
    }

    pub fn redundant_bytes_read_per_row(
        &self,
        partitions: &PartitionsMap,
        plan: &SelectionPlan,
    ) -> u64 {
        let mut redundant = 0u64;

        for (&q, selected) in plan {
            for p in selected {
                for &a in &partitions[p] {
                    if self.w.usage_matrix[q][a] == 0 {
                        redundant += self.w.attribute_sizes[a] as u64;
                    }
                }
            }
        }

        redundant
    }

    pub fn redundant_bytes_read_per_table(
        &self,
        partitions: &PartitionsMap,
        plan: &SelectionPlan,
    ) -> u64 {
        self.redundant_bytes_read_per_row(partitions, plan) * self.w.num_rows
    }

    pub fn total_data_read(&self, partitions: &PartitionsMap, plan: &SelectionPlan) -> u64 {
        let redundant = self.redundant_bytes_read_per_row(partitions, plan);
        let useful = referenced_data_size_per_row(&self.w);
        (useful + redundant) * self.w.num_rows
    }

    pub fn fraction_of_redundant_bytes_read(
        &self,
        partitions: &PartitionsMap,
        plan: &SelectionPlan,
    ) -> f64 {
        let redundant = self.redundant_bytes_read_per_row(partitions, plan) as f64;
        let useful = referenced_data_size_per_row(&self.w) as f64;
        if useful + redundant == 0.0 {
            return 0.0;
        }
        redundant / (useful + redundant)
    }

    pub fn attribute_joins_per_row(&self, plan: &SelectionPlan) -> u64 {
        plan.values()
            .map(|selected| selected.len().saturating_sub(1) as u64)
            .sum()
    }

    pub fn attribute_joins_per_table(&self, plan: &SelectionPlan) -> u64 {
        self.attribute_joins_per_row(plan) * self.w.num_rows
    }

    pub fn average_attribute_joins(&self, plan: &SelectionPlan) -> f64 {
        self.attribute_joins_per_row(plan) as f64 / self.w.query_count as f64
    }
}

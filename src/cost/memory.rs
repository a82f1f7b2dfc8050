use crate::workload::WorkloadSnapshot;

/// Cache line width in bytes.
pub const CACHE_LINE_WIDTH: u64 = 64;

/// Main-memory cost model counting cache misses caused by a query scanning a
/// partition. Attributes a query projects may sit non-contiguously within the
/// partition; gaps of at least a cache line can be skipped, smaller gaps are
/// read along with the projected data.
#[derive(Debug, Clone)]
pub struct MemCostModel {
    w: WorkloadSnapshot,
    line_width: u64,
}

impl MemCostModel {
    pub fn new(w: &WorkloadSnapshot) -> Self {
        MemCostModel {
            w: w.clone(),
            line_width: CACHE_LINE_WIDTH,
        }
    }

    /// Cache misses of `query` scanning the partition holding `attributes`.
    /// Returns 0 if the query references none of them.
    pub fn cache_misses(&self, attributes: &[usize], query: usize) -> u64 {
        let mut partition = attributes.to_vec();
        partition.sort_unstable();

        let referenced: Vec<bool> = partition
            .iter()
            .map(|&a| self.w.usage_matrix[query][a] == 1)
            .collect();
        if !referenced.iter().any(|&r| r) {
            return 0;
        }

        // Decompose the partition row into projected stretches separated by
        // gaps of non-referenced attributes.
        let mut partition_size = 0u64;
        let mut gap_offset = 0u64;
        let mut gap_width = 0u64;
        let mut in_gap = false;
        let mut gap_offsets: Vec<u64> = Vec::new();
        let mut gap_widths: Vec<u64> = Vec::new();

        for (i, &a) in partition.iter().enumerate() {
            let size = self.w.attribute_sizes[a] as u64;
            if !referenced[i] {
                if !in_gap {
                    gap_width = 0;
                    in_gap = true;
                }
                gap_width += size;
            } else {
                if in_gap {
                    gap_offsets.push(gap_offset);
                    gap_widths.push(gap_width);
                    gap_offset += gap_width;
                    in_gap = false;
                }
                gap_offset += size;
            }
            partition_size += size;
        }
        if in_gap {
            gap_offsets.push(gap_offset);
            gap_widths.push(gap_width);
        }

        // Dummy zero-width gaps when the first or last attribute is projected.
        if gap_offsets.first().is_none_or(|&o| o > 0) {
            gap_offsets.insert(0, 0);
            gap_widths.insert(0, 0);
        }
        if gap_offset == partition_size {
            gap_offsets.push(partition_size);
            gap_widths.push(0);
        }

        self.gapped_misses(&gap_offsets, &gap_widths, partition_size, self.w.num_rows, 0)
    }

    /// Misses of a projection split into several stretches. Gaps narrower than
    /// a cache line cannot be skipped; the stretches before the first and
    /// after the last skippable gap wrap around and may share lines.
    fn gapped_misses(
        &self,
        gap_offsets: &[u64],
        gap_widths: &[u64],
        container_width: u64,
        container_rows: u64,
        container_offset: u64,
    ) -> u64 {
        let last = gap_widths.len() - 1;
        let mut projection_offset = gap_offsets[0];
        let mut first_skip = true;

        let merge_first_last = gap_widths[0] + gap_widths[last] < self.line_width;
        if !merge_first_last {
            projection_offset += gap_widths[0];
            first_skip = false;
        }

        // only one contiguous stretch is projected
        if gap_offsets.len() == 2 {
            let projection_width = gap_offsets[1] - gap_widths[0];
            return self.contiguous_misses(
                projection_width,
                gap_widths[0],
                container_width,
                container_rows,
                container_offset,
            );
        }

        let mut misses = 0u64;
        let mut first_last_width = 0u64;
        let mut skipped_in_between = false;

        for i in 1..last {
            if gap_widths[i] >= self.line_width {
                skipped_in_between = true;

                let projection_width = gap_offsets[i] - projection_offset;
                if merge_first_last && first_skip {
                    first_last_width += projection_width;
                } else {
                    misses += self.contiguous_misses(
                        projection_width,
                        projection_offset,
                        container_width,
                        container_rows,
                        container_offset,
                    );
                }

                projection_offset = gap_offsets[i] + gap_widths[i];
                first_skip = false;
            }
        }

        if merge_first_last {
            first_last_width += container_width - projection_offset;
            misses += self.contiguous_misses(
                first_last_width,
                projection_offset,
                container_width,
                container_rows,
                container_offset,
            );
        } else if !skipped_in_between {
            misses += self.contiguous_misses(
                gap_offsets[last] - gap_widths[0],
                gap_widths[0],
                container_width,
                container_rows,
                container_offset,
            );
        }

        misses
    }

    /// Misses of one contiguous stretch of projected bytes per row.
    fn contiguous_misses(
        &self,
        projection_width: u64,
        projection_offset: u64,
        container_width: u64,
        container_rows: u64,
        container_offset: u64,
    ) -> u64 {
        let line = self.line_width;

        if container_width - projection_width < line {
            // the non-projected rest of the row cannot be skipped
            ((container_width * container_rows + container_offset) as f64 / line as f64).ceil()
                as u64
        } else {
            // alignment repeats with period v rows
            let v = line / gcd(container_width, line);
            let mut misses = 0u64;
            for r in 0..v {
                let row_offset = container_width * r;
                let line_offset = (container_offset + row_offset + projection_offset) % line;
                misses += ((line_offset + projection_width) as f64 / line as f64).ceil() as u64;
            }
            (misses as f64 * container_rows as f64 / v as f64) as u64
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::Table;

    #[test]
    fn test_fully_projected_partition() {
        let mut t = Table::simple(1, 1000);
        t.add_projection_query("q0", 1, vec![0]);
        let cm = MemCostModel::new(&WorkloadSnapshot::of_table(&t));

        // 4 bytes * 1000 rows = 4000 bytes, 63 cache lines
        assert_eq!(cm.cache_misses(&[0], 0), 63);
    }

    #[test]
    fn test_unreferenced_partition_is_free() {
        let mut t = Table::simple(2, 1000);
        t.add_projection_query("q0", 1, vec![0]);
        let cm = MemCostModel::new(&WorkloadSnapshot::of_table(&t));

        assert_eq!(cm.cache_misses(&[1], 0), 0);
    }

    #[test]
    fn test_wide_gap_is_skipped() {
        use crate::workload::{Attribute, Query};

        let mut t = Table::new(
            "t",
            vec![
                Attribute::new("a", 8),
                Attribute::new("b", 128),
                Attribute::new("c", 8),
            ],
            4000,
        );
        t.queries.push(Query::projection("q0", 1, vec![0, 2]));
        let cm = MemCostModel::new(&WorkloadSnapshot::of_table(&t));

        // the 128-byte gap can be skipped; the two 8-byte stretches wrap
        // around and are costed as one merged projection
        let misses = cm.cache_misses(&[0, 1, 2], 0);
        assert_eq!(misses, 5000);

        let full_scan = (144u64 * 4000).div_ceil(64);
        assert!(misses < full_scan);
    }
}

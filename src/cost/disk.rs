use serde::{Deserialize, Serialize};

use super::IoCost;

/// Tunable characteristics of the modeled disk and DBMS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskParams {
    /// Block size of the DBMS in bytes.
    pub block_size: u64,
    /// I/O buffer size of the DBMS in bytes, shared by all partitions a
    /// query references.
    pub buffer_size: u64,
    /// Seek time in seconds.
    pub seek_time: f64,
    /// Sequential read bandwidth in bytes per second.
    pub read_bandwidth: f64,
    /// Sequential write bandwidth in bytes per second.
    pub write_bandwidth: f64,
}

pub const DEFAULT_BLOCK_SIZE: u64 = 8 * 1024;
pub const DEFAULT_BUFFER_SIZE: u64 = 1024 * DEFAULT_BLOCK_SIZE;

impl Default for DiskParams {
    fn default() -> Self {
        DiskParams {
            block_size: DEFAULT_BLOCK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            seek_time: 0.008,
            read_bandwidth: 92.0 * 1024.0 * 1024.0,
            write_bandwidth: 70.0 * 1024.0 * 1024.0,
        }
    }
}

/// Seek plus scan time of reading one partition, assuming all partitions
/// referenced by a query stream through a shared buffer.
#[derive(Debug, Clone, Copy)]
pub struct DiskCostModel {
    pub params: DiskParams,
    pub num_rows: u64,
}

impl DiskCostModel {
    pub fn new(params: DiskParams, num_rows: u64) -> Self {
        DiskCostModel { params, num_rows }
    }

    /// Copy of this model suitable for costing writes: the read bandwidth is
    /// replaced by the write bandwidth.
    pub fn for_writing(&self) -> Self {
        let mut params = self.params;
        params.read_bandwidth = params.write_bandwidth;
        DiskCostModel { params, num_rows: self.num_rows }
    }

    /// Copy with a different buffer size, leaving everything else intact.
    pub fn with_buffer_size(&self, buffer_size: u64) -> Self {
        let mut params = self.params;
        params.buffer_size = buffer_size;
        DiskCostModel { params, num_rows: self.num_rows }
    }

    /// Cost of one query reading a full partition. `referenced_row_size` is
    /// the sum of the row sizes of all partitions the query references; it
    /// determines the partition's share of the buffer.
    pub fn costs(&self, partition_row_size: u32, referenced_row_size: u32) -> IoCost {
        self.costs_with_ratio(partition_row_size, referenced_row_size, 1.0)
    }

    pub fn cost(&self, partition_row_size: u32, referenced_row_size: u32) -> f64 {
        self.costs(partition_row_size, referenced_row_size).total()
    }

    /// Cost of reading only `ratio_of_blocks` of the partition's blocks,
    /// paying an extra seek for every skipped block within a buffer fill.
    pub fn costs_with_ratio(
        &self,
        partition_row_size: u32,
        referenced_row_size: u32,
        ratio_of_blocks: f64,
    ) -> IoCost {
        let block_size = self.params.block_size as f64;

        // The partition's share of the buffer, at least one block.
        let partition_buffer_size = (self.params.buffer_size as f64 * partition_row_size as f64
            / referenced_row_size as f64)
            .floor()
            .max(block_size);
        let blocks_per_buffer = (partition_buffer_size / block_size).floor();

        let number_of_blocks =
            (partition_row_size as f64 * self.num_rows as f64 / block_size * ratio_of_blocks)
                .ceil();

        let mut seek = self.params.seek_time * (number_of_blocks / blocks_per_buffer).ceil();
        if ratio_of_blocks < 1.0 {
            seek *= 1.0 + (blocks_per_buffer * (1.0 - ratio_of_blocks)).ceil();
        }

        IoCost {
            seek,
            scan: number_of_blocks * block_size / self.params.read_bandwidth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scan_costs() {
        let cm = DiskCostModel::new(DiskParams::default(), 1_000_000);

        // a 16-byte partition of 1M rows spans ceil(16M / 8K) = 1954 blocks
        let costs = cm.costs(16, 16);
        assert_eq!(costs.scan, 1954.0 * 8192.0 / (92.0 * 1024.0 * 1024.0));
        // sole referenced partition, so it owns the whole 1024-block buffer
        assert_eq!(costs.seek, 0.008 * (1954.0f64 / 1024.0).ceil());
    }

    #[test]
    fn test_buffer_is_shared_between_referenced_partitions() {
        let cm = DiskCostModel::new(DiskParams::default(), 1_000_000);

        // same partition, but the query references 4x more data in total:
        // the partition gets a quarter of the buffer, so more seeks
        let alone = cm.costs(16, 16);
        let shared = cm.costs(16, 64);
        assert!(shared.seek > alone.seek);
        assert_eq!(shared.scan, alone.scan);
    }

    #[test]
    fn test_writing_uses_write_bandwidth() {
        let cm = DiskCostModel::new(DiskParams::default(), 1_000_000);
        let write = cm.for_writing();

        assert!(write.costs(16, 16).scan > cm.costs(16, 16).scan);
        assert_eq!(write.costs(16, 16).seek, cm.costs(16, 16).seek);
    }

    #[test]
    fn test_partial_read_scans_less() {
        let cm = DiskCostModel::new(DiskParams::default(), 1_000_000);

        let full = cm.costs_with_ratio(16, 64, 1.0);
        let partial = cm.costs_with_ratio(16, 64, 0.01);
        assert!(partial.scan < full.scan);
        // skipped blocks cost extra seeks
        assert!(partial.seek > full.seek);
    }
}

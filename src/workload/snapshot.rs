use super::table::Table;

/// Immutable, array-based projection of a table's workload.
///
/// Algorithms and cost calculators never read the `Table` directly; they work
/// on this snapshot, which is created once per run and never mutated. Any
/// transformation (transposition for query grouping, attribute reduction)
/// produces a new snapshot.
#[derive(Debug, Clone)]
pub struct WorkloadSnapshot {
    /// `usage_matrix[query][attribute]` is 1 iff the query projects the
    /// attribute. Filtered-but-not-projected attributes are not included.
    pub usage_matrix: Vec<Vec<u8>>,
    /// Attribute sizes in bytes.
    pub attribute_sizes: Vec<u32>,
    pub attribute_count: usize,
    pub query_count: usize,
    pub query_weights: Vec<u32>,
    pub num_rows: u64,
    /// Total size of a single row, in bytes.
    pub row_size: u32,
    /// `selectivity_columns[query]` lists the attributes the query filters on.
    pub selectivity_columns: Vec<Vec<usize>>,
    /// Per-query selectivity.
    pub selectivities: Vec<f64>,
}

impl WorkloadSnapshot {
    pub fn of_table(table: &Table) -> Self {
        let attribute_count = table.attribute_count();
        let usage_matrix: Vec<Vec<u8>> = table
            .queries
            .iter()
            .map(|q| q.usage_vector(attribute_count))
            .collect();
        let attribute_sizes = table.attribute_sizes();
        let row_size = attribute_sizes.iter().sum();

        WorkloadSnapshot {
            query_count: usage_matrix.len(),
            usage_matrix,
            attribute_count,
            query_weights: table.queries.iter().map(|q| q.weight).collect(),
            num_rows: table.num_rows,
            row_size,
            selectivity_columns: table.queries.iter().map(|q| q.filtered.clone()).collect(),
            selectivities: table.queries.iter().map(|q| q.selectivity).collect(),
            attribute_sizes,
        }
    }

    /// Attributes the query references, in ascending order.
    pub fn query_access_set(&self, query: usize) -> Vec<usize> {
        (0..self.attribute_count)
            .filter(|&a| self.usage_matrix[query][a] == 1)
            .collect()
    }

    /// Attributes referenced by at least one of the given queries, ascending.
    pub fn referenced_attributes(&self, queries: &[usize]) -> Vec<usize> {
        (0..self.attribute_count)
            .filter(|&a| queries.iter().any(|&q| self.usage_matrix[q][a] == 1))
            .collect()
    }

    /// Attributes no query of the workload references.
    pub fn non_referenced_attributes(&self) -> Vec<usize> {
        let all: Vec<usize> = (0..self.query_count).collect();
        let referenced = self.referenced_attributes(&all);
        (0..self.attribute_count)
            .filter(|a| !referenced.contains(a))
            .collect()
    }

    /// Sum of the sizes of the attributes the query references.
    pub fn referenced_row_size(&self, query: usize) -> u32 {
        (0..self.attribute_count)
            .filter(|&a| self.usage_matrix[query][a] == 1)
            .map(|a| self.attribute_sizes[a])
            .sum()
    }

    /// Derived snapshot grouping queries instead of attributes: the usage
    /// matrix is transposed, all-zero rows are removed, and attribute sizes
    /// become the query weights. Used by TrojanLayout's query replication;
    /// the original snapshot is left untouched.
    pub fn transposed_for_queries(&self) -> WorkloadSnapshot {
        let mut usage_matrix: Vec<Vec<u8>> = vec![vec![0; self.query_count]; self.attribute_count];
        for q in 0..self.query_count {
            for a in 0..self.attribute_count {
                usage_matrix[a][q] = self.usage_matrix[q][a];
            }
        }
        usage_matrix.retain(|row| row.iter().any(|&u| u == 1));

        let query_count = usage_matrix.len();
        let attribute_count = usage_matrix.first().map_or(0, |row| row.len());
        let attribute_sizes = self.query_weights.clone();
        let row_size = attribute_sizes.iter().sum();

        WorkloadSnapshot {
            usage_matrix,
            attribute_sizes,
            attribute_count,
            query_count,
            query_weights: vec![1; query_count],
            num_rows: self.num_rows,
            row_size,
            selectivity_columns: vec![Vec::new(); query_count],
            selectivities: vec![1.0; query_count],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::Table;

    fn snapshot() -> WorkloadSnapshot {
        let mut t = Table::simple(4, 1000);
        t.add_projection_query("q0", 2, vec![0, 1]);
        t.add_projection_query("q1", 3, vec![1, 3]);
        WorkloadSnapshot::of_table(&t)
    }

    #[test]
    fn test_of_table() {
        let w = snapshot();
        assert_eq!(w.query_count, 2);
        assert_eq!(w.attribute_count, 4);
        assert_eq!(w.row_size, 16);
        assert_eq!(w.usage_matrix[0], vec![1, 1, 0, 0]);
        assert_eq!(w.usage_matrix[1], vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_referenced_attributes() {
        let w = snapshot();
        assert_eq!(w.referenced_attributes(&[0, 1]), vec![0, 1, 3]);
        assert_eq!(w.non_referenced_attributes(), vec![2]);
    }

    #[test]
    fn test_transposed_for_queries() {
        let w = snapshot();
        let t = w.transposed_for_queries();

        // attribute 2 is never referenced, so its transposed row is dropped
        assert_eq!(t.query_count, 3);
        assert_eq!(t.attribute_count, 2);
        assert_eq!(t.attribute_sizes, vec![2, 3]);
        assert_eq!(t.usage_matrix[0], vec![1, 0]); // attribute 0: only q0
        assert_eq!(t.usage_matrix[1], vec![1, 1]); // attribute 1: both
        assert_eq!(t.usage_matrix[2], vec![0, 1]); // attribute 3: only q1

        // the source snapshot is unchanged
        assert_eq!(w.query_count, 2);
    }
}

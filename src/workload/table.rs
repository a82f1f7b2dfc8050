use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::attribute::Attribute;
use super::query::{Query, RangeFilter};

/// A table schema together with the workload of queries touching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub num_rows: u64,
    pub queries: Vec<Query>,
}

impl Table {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>, num_rows: u64) -> Self {
        Table {
            name: name.into(),
            attributes,
            num_rows,
            queries: Vec::new(),
        }
    }

    /// Table with `n` equally-sized integer attributes named A, B, C...
    pub fn simple(n: usize, num_rows: u64) -> Self {
        let attributes = (0..n)
            .map(|i| Attribute::integer(((b'A' + (i % 26) as u8) as char).to_string()))
            .collect();
        Table::new("sample", attributes, num_rows)
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn attribute_sizes(&self) -> Vec<u32> {
        self.attributes.iter().map(|a| a.size).collect()
    }

    /// Add a project-only query.
    pub fn add_projection_query(&mut self, name: impl Into<String>, weight: u32, projected: Vec<usize>) {
        self.queries.push(Query::projection(name, weight, projected));
    }

    /// Add a query with projections and filter predicates.
    pub fn add_filtered_query(
        &mut self,
        name: impl Into<String>,
        weight: u32,
        projected: Vec<usize>,
        filtered: Vec<usize>,
        selectivity: f64,
    ) {
        self.queries
            .push(Query::filtered(name, weight, projected, filtered, selectivity));
    }

    /// Add a query carrying a range predicate usable for index marking.
    pub fn add_range_query(
        &mut self,
        name: impl Into<String>,
        weight: u32,
        projected: Vec<usize>,
        range: RangeFilter,
    ) {
        let mut q = Query::projection(name, weight, projected);
        q.range_filter = Some(range);
        self.queries.push(q);
    }

    pub fn query_by_name(&self, name: &str) -> Option<&Query> {
        self.queries.iter().find(|q| q.name == name)
    }

    /// Create a reduced table over a subset of attributes and queries, with
    /// attribute ids remapped into the reduced space. Used by recursive
    /// sub-searches (per-replica re-optimization, reduced exhaustive search).
    pub fn partial(&self, attributes: &[usize], queries: &[usize]) -> Table {
        let mut sorted = attributes.to_vec();
        sorted.sort_unstable();

        let attribute_index: HashMap<usize, usize> =
            sorted.iter().enumerate().map(|(i, &a)| (a, i)).collect();

        let partial_attributes = sorted
            .iter()
            .map(|&a| self.attributes[a].clone())
            .collect();

        let mut partial = Table::new(self.name.clone(), partial_attributes, self.num_rows);
        partial.queries = queries
            .iter()
            .filter(|&&q| q < self.queries.len())
            .map(|&q| self.queries[q].remapped(&attribute_index))
            .collect();

        partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_table() {
        let t = Table::simple(4, 100);
        assert_eq!(t.attribute_count(), 4);
        assert_eq!(t.attributes[0].name, "A");
        assert_eq!(t.attributes[3].name, "D");
        assert_eq!(t.attribute_sizes(), vec![4, 4, 4, 4]);
    }

    #[test]
    fn test_partial_table_remaps_queries() {
        let mut t = Table::simple(4, 100);
        t.add_projection_query("q0", 1, vec![0, 1]);
        t.add_projection_query("q1", 1, vec![2, 3]);

        let partial = t.partial(&[2, 3], &[1]);
        assert_eq!(partial.attribute_count(), 2);
        assert_eq!(partial.queries.len(), 1);
        assert_eq!(partial.queries[0].projected, vec![0, 1]);
    }
}

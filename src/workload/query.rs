use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A range predicate over a single attribute, used by TrojanLayout's index
/// marking. `touched_rows` is the number of rows the predicate selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub attribute: usize,
    pub touched_rows: u64,
    /// Set when a clustered index on `attribute` has been chosen for the
    /// replica serving this query. Costing refinement only.
    #[serde(default)]
    pub indexed: bool,
}

/// A query projecting some columns of a single table, optionally filtering as
/// well. Queries touching multiple tables are represented by one `Query` per
/// table touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    /// Relative occurrence or importance of the query within the workload.
    pub weight: u32,
    /// Attribute indices projected by the query, in ascending order.
    pub projected: Vec<usize>,
    /// Attribute indices appearing in selection predicates.
    #[serde(default)]
    pub filtered: Vec<usize>,
    /// Fraction of rows selected by the filters.
    #[serde(default = "default_selectivity")]
    pub selectivity: f64,
    #[serde(default)]
    pub range_filter: Option<RangeFilter>,
}

fn default_selectivity() -> f64 {
    1.0
}

impl Query {
    pub fn projection(name: impl Into<String>, weight: u32, projected: Vec<usize>) -> Self {
        Query {
            name: name.into(),
            weight,
            projected,
            filtered: Vec::new(),
            selectivity: 1.0,
            range_filter: None,
        }
    }

    pub fn filtered(
        name: impl Into<String>,
        weight: u32,
        projected: Vec<usize>,
        filtered: Vec<usize>,
        selectivity: f64,
    ) -> Self {
        Query {
            name: name.into(),
            weight,
            projected,
            filtered,
            selectivity,
            range_filter: None,
        }
    }

    /// Usage vector over `attribute_count` attributes: 1 for projected
    /// attributes, 0 otherwise. Filtered-but-not-projected attributes are
    /// tracked separately for selectivity costing.
    pub fn usage_vector(&self, attribute_count: usize) -> Vec<u8> {
        let mut usage = vec![0u8; attribute_count];
        for &p in &self.projected {
            usage[p] = 1;
        }
        usage
    }

    /// Reduce this query to a smaller attribute space. `attribute_index` maps
    /// original attribute ids to ids in the reduced space; projections and
    /// filters outside the mapping are dropped.
    pub fn remapped(&self, attribute_index: &HashMap<usize, usize>) -> Query {
        let mut reduced = self.clone();
        reduced.projected = self
            .projected
            .iter()
            .filter_map(|a| attribute_index.get(a).copied())
            .collect();
        reduced.filtered = self
            .filtered
            .iter()
            .filter_map(|a| attribute_index.get(a).copied())
            .collect();
        reduced.range_filter = self.range_filter.as_ref().and_then(|r| {
            attribute_index.get(&r.attribute).map(|&a| RangeFilter {
                attribute: a,
                touched_rows: r.touched_rows,
                indexed: r.indexed,
            })
        });
        reduced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_vector() {
        let q = Query::projection("q1", 1, vec![0, 2]);
        assert_eq!(q.usage_vector(4), vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_remapped_drops_unmapped_attributes() {
        let q = Query::filtered("q1", 1, vec![1, 3], vec![3], 0.1);
        let index: HashMap<usize, usize> = [(1, 0), (3, 1)].into_iter().collect();

        let reduced = q.remapped(&index);
        assert_eq!(reduced.projected, vec![0, 1]);
        assert_eq!(reduced.filtered, vec![1]);
    }
}

use vertpart::workload::{Attribute, Table};

/// Two queries touching disjoint halves of a four attribute table. Every
/// reasonable algorithm should keep the halves apart.
pub fn disjoint_workload() -> Table {
    let mut t = Table::simple(4, 1_000_000);
    t.add_projection_query("q0", 1, vec![0, 1]);
    t.add_projection_query("q1", 1, vec![2, 3]);
    t
}

/// Every query scans every attribute; the row layout is unbeatable.
pub fn full_scan_workload() -> Table {
    let mut t = Table::simple(4, 1_000_000);
    t.add_projection_query("q0", 1, vec![0, 1, 2, 3]);
    t.add_projection_query("q1", 2, vec![0, 1, 2, 3]);
    t
}

/// A small product table with overlapping queries of different weights.
pub fn product_workload() -> Table {
    let attributes = vec![
        Attribute::integer("id"),
        Attribute::varchar("name", 32),
        Attribute::double("price"),
        Attribute::integer("stock"),
    ];
    let mut t = Table::new("products", attributes, 500_000);
    t.add_projection_query("lookup", 4, vec![0, 1]);
    t.add_projection_query("report", 1, vec![1, 2, 3]);
    t.add_projection_query("restock", 2, vec![0, 3]);
    t
}

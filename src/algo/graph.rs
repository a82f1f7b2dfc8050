//! K-way graph partitioning behind [`Hyrise`](super::Hyrise).
//!
//! The attribute affinity graph is handed to an external partitioner through
//! the [`GraphPartitioner`] trait; [`MetisPartitioner`] shells out to the
//! METIS `kmetis` binary, tests inject a deterministic stand-in instead.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphPartitionError {
    #[error("graph partitioner i/o")]
    Io(#[from] std::io::Error),

    #[error("graph partitioner {binary:?} exited with {status}")]
    Failed {
        binary: String,
        status: std::process::ExitStatus,
    },

    #[error("unreadable group id {line:?} in partition file")]
    MalformedGroupId { line: String },

    #[error("partition file lists {actual} vertices, the graph has {expected}")]
    VertexCountMismatch { actual: usize, expected: usize },
}

/// Partitions a weighted undirected graph, given as a symmetric affinity
/// matrix, into at most `k` vertex groups.
pub trait GraphPartitioner {
    fn partition(
        &self,
        affinity: &[Vec<i64>],
        k: usize,
    ) -> Result<Vec<usize>, GraphPartitionError>;
}

/// Runs the METIS `kmetis` binary on the serialized affinity graph and reads
/// the group assignment back from the `.part.<k>` file it leaves behind.
pub struct MetisPartitioner {
    binary: PathBuf,
}

impl MetisPartitioner {
    pub fn new() -> Self {
        Self::with_binary("kmetis")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        MetisPartitioner {
            binary: binary.into(),
        }
    }
}

impl Default for MetisPartitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphPartitioner for MetisPartitioner {
    fn partition(
        &self,
        affinity: &[Vec<i64>],
        k: usize,
    ) -> Result<Vec<usize>, GraphPartitionError> {
        if affinity.is_empty() {
            return Ok(Vec::new());
        }

        // distinct file per invocation, concurrent runs must not collide
        static RUN: AtomicU64 = AtomicU64::new(0);
        let graph_path = std::env::temp_dir().join(format!(
            "vertpart_affinity_{}_{}.graph",
            std::process::id(),
            RUN.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&graph_path, metis_graph(affinity))?;

        let status = Command::new(&self.binary)
            .arg(&graph_path)
            .arg(k.to_string())
            .status()?;
        if !status.success() {
            return Err(GraphPartitionError::Failed {
                binary: self.binary.display().to_string(),
                status,
            });
        }

        let part_path = graph_path.with_file_name(format!(
            "{}.part.{k}",
            graph_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        let assignment = parse_partition_file(&std::fs::read_to_string(&part_path)?)?;

        let _ = std::fs::remove_file(&graph_path);
        let _ = std::fs::remove_file(&part_path);

        if assignment.len() != affinity.len() {
            return Err(GraphPartitionError::VertexCountMismatch {
                actual: assignment.len(),
                expected: affinity.len(),
            });
        }

        debug!("kmetis split {} vertices into {k} groups", affinity.len());
        Ok(assignment)
    }
}

/// Serialize the affinity matrix in the METIS graph format: a header line
/// `<vertices> <edges> 1`, then one line per vertex listing `<neighbor>
/// <weight>` pairs with 1-based vertex ids.
///
/// METIS rejects isolated vertices, so a vertex without any affinity gets a
/// synthetic weight-1 edge to its cyclic successor.
pub(crate) fn metis_graph(affinity: &[Vec<i64>]) -> String {
    let n = affinity.len();
    let mut orphan = vec![vec![0i64; n]; n];

    let mut edges = 0usize;
    for i in 0..n {
        edges += (0..i).filter(|&j| affinity[i][j] != 0).count();

        let references: i64 = (0..n).filter(|&j| j != i).map(|j| affinity[i][j]).sum();
        if references == 0 && orphan[i][(i + 1) % n] == 0 {
            orphan[i][(i + 1) % n] = 1;
            orphan[(i + 1) % n][i] = 1;
            edges += 1;
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{n} {edges} 1");
    for i in 0..n {
        let row: Vec<String> = (0..n)
            .filter(|&j| j != i && (affinity[i][j] != 0 || orphan[i][j] != 0))
            .map(|j| format!("{} {}", j + 1, affinity[i][j].max(orphan[i][j])))
            .collect();
        let _ = writeln!(out, "{}", row.join(" "));
    }
    out
}

fn parse_partition_file(contents: &str) -> Result<Vec<usize>, GraphPartitionError> {
    let mut assignment = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let group = line
            .parse::<usize>()
            .map_err(|_| GraphPartitionError::MalformedGroupId {
                line: line.to_string(),
            })?;
        assignment.push(group);
    }
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metis_graph_format() {
        // two components: {0, 1} strongly connected, 2 isolated
        let affinity = vec![vec![2, 3, 0], vec![3, 1, 0], vec![0, 0, 5]];
        let graph = metis_graph(&affinity);

        let lines: Vec<&str> = graph.lines().collect();
        assert_eq!(lines[0], "3 2 1");
        // vertex 1 lists its real neighbor plus the back edge of vertex 3
        assert_eq!(lines[1], "2 3 3 1");
        assert_eq!(lines[2], "1 3");
        // isolated vertex gets a synthetic edge to its successor
        assert_eq!(lines[3], "1 1");
    }

    #[test]
    fn test_synthetic_edge_is_symmetric() {
        let affinity = vec![vec![0, 0], vec![0, 0]];
        let graph = metis_graph(&affinity);

        let lines: Vec<&str> = graph.lines().collect();
        assert_eq!(lines[0], "2 1 1");
        assert_eq!(lines[1], "2 1");
        assert_eq!(lines[2], "1 1");
    }

    #[test]
    fn test_parse_partition_file() {
        let assignment = parse_partition_file("0\n2\n1\n").unwrap();
        assert_eq!(assignment, vec![0, 2, 1]);

        assert!(matches!(
            parse_partition_file("0\nx\n"),
            Err(GraphPartitionError::MalformedGroupId { .. })
        ));
    }
}

//! Record stream reader
//!
//! The ingest command reads one JSON object per line:
//! `{"vertex": {...}}` or `{"edge": {...}}`. Blank lines are ignored; lines
//! that fail to parse are logged and skipped.

use std::io::BufRead;
use serde::{Deserialize, Serialize};
use crate::edge::Edge;
use crate::storage::ProvenanceStorage;
use crate::vertex::Vertex;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRecord {
    Vertex(Vertex),
    Edge(Edge),
}

impl StreamRecord {
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Counts from one pass over a stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub vertices: usize,
    pub edges: usize,
    pub skipped_lines: usize,
    /// put_vertex/put_edge calls that reported failure, across all backends
    pub rejected: usize,
}

impl std::fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Ingest Summary:")?;
        writeln!(f, "  Vertices: {}", self.vertices)?;
        writeln!(f, "  Edges: {}", self.edges)?;
        writeln!(f, "  Skipped lines: {}", self.skipped_lines)?;
        writeln!(f, "  Rejected: {}", self.rejected)
    }
}

/// Feed every record of `reader` to each backend in order.
///
/// `on_record` is called after each parsed line (progress reporting).
pub fn ingest<R: BufRead>(
    reader: R,
    backends: &[&dyn ProvenanceStorage],
    mut on_record: impl FnMut(&IngestSummary),
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = match StreamRecord::parse(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping line {}: {}", index + 1, e);
                summary.skipped_lines += 1;
                continue;
            }
        };

        match &record {
            StreamRecord::Vertex(vertex) => {
                summary.vertices += 1;
                for backend in backends {
                    if !backend.put_vertex(vertex) {
                        summary.rejected += 1;
                    }
                }
            }
            StreamRecord::Edge(edge) => {
                summary.edges += 1;
                for backend in backends {
                    if !backend.put_edge(edge) {
                        summary.rejected += 1;
                    }
                }
            }
        }
        on_record(&summary);
    }

    Ok(summary)
}

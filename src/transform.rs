//! Post-query graph filters
//!
//! Filters rebuild a graph from the edges they keep; vertices not attached
//! to a kept edge are dropped.

use crate::edge::Edge;
use crate::graph::ProvenanceGraph;
use crate::vertex::ArtifactSubtype;

/// A filter applied to query results before they are returned to a client.
pub trait GraphTransform {
    fn name(&self) -> &'static str;

    /// Whether `edge` survives the filter
    fn keep(&self, edge: &Edge) -> bool;

    fn apply(&self, graph: &ProvenanceGraph) -> ProvenanceGraph {
        let mut result = ProvenanceGraph::new();
        for edge in graph.edges().filter(|e| self.keep(e)) {
            result.add_edge(edge.clone());
        }
        result
    }
}

/// Drops memory artifacts together with every edge touching them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemory;

impl GraphTransform for NoMemory {
    fn name(&self) -> &'static str {
        "no-memory"
    }

    fn keep(&self, edge: &Edge) -> bool {
        edge.source.artifact_subtype() != Some(ArtifactSubtype::Memory)
            && edge.destination.artifact_subtype() != Some(ArtifactSubtype::Memory)
    }
}

/// Drops the rename/link edges that only carry an artifact's previous name.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastName;

const NAME_CHANGE_OPERATIONS: &[&str] = &[
    "rename",
    "rename_read",
    "link",
    "link_read",
    "symlink",
    "symlink_read",
];

impl GraphTransform for LastName {
    fn name(&self) -> &'static str {
        "last-name"
    }

    fn keep(&self, edge: &Edge) -> bool {
        !edge
            .operation()
            .is_some_and(|op| NAME_CHANGE_OPERATIONS.contains(&op))
    }
}

/// Look a filter up by its CLI name
pub fn by_name(name: &str) -> Option<Box<dyn GraphTransform>> {
    match name {
        "no-memory" | "nomemory" => Some(Box::new(NoMemory)),
        "last-name" | "lastname" => Some(Box::new(LastName)),
        _ => None,
    }
}
